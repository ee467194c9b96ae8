use std::collections::HashMap;

use rstest::rstest;

use bmprune::domain::{
    plan, Bookmark, BookmarkTree, DomainSet, FailureKind, NodeId, PlanCriteria, ProbeOutcome,
    ProbeResult, RemovalReason, Scope,
};

struct Fixture {
    tree: BookmarkTree,
    work: NodeId,
    a: NodeId,
    b: NodeId,
    c: NodeId,
}

/// `Work/` holding A (a.example), B (b.example) and C (c.example).
fn fixture() -> Fixture {
    let mut tree = BookmarkTree::new();
    let work = tree.add_folder(tree.root(), "Work").unwrap();
    let a = tree
        .add_bookmark(work, Bookmark::new("A", "https://a.example/"))
        .unwrap();
    let b = tree
        .add_bookmark(work, Bookmark::new("B", "https://b.example/"))
        .unwrap();
    let c = tree
        .add_bookmark(work, Bookmark::new("C", "https://c.example/"))
        .unwrap();
    Fixture {
        tree,
        work,
        a,
        b,
        c,
    }
}

fn results(entries: Vec<(NodeId, ProbeOutcome)>) -> HashMap<NodeId, ProbeResult> {
    entries
        .into_iter()
        .map(|(id, outcome)| (id, ProbeResult::new(id, outcome, 1)))
        .collect()
}

#[test]
fn given_failed_and_redirected_probes_when_planning_then_both_removed_in_tree_order() {
    // Arrange
    let f = fixture();
    let probes = results(vec![
        (f.a, ProbeOutcome::Status(200)),
        (f.b, ProbeOutcome::Failed(FailureKind::DnsFailure)),
        (f.c, ProbeOutcome::Status(301)),
    ]);

    // Act
    let plan = plan(&f.tree, &probes, &PlanCriteria::default());

    // Assert
    let ids: Vec<NodeId> = plan.ids().collect();
    assert_eq!(ids, vec![f.b, f.c]);
    assert_eq!(
        plan.reason(f.b),
        Some(&RemovalReason::ProbeFailure(FailureKind::DnsFailure))
    );
    assert_eq!(plan.reason(f.c), Some(&RemovalReason::StatusThreshold(301)));
    assert!(!plan.contains(f.a));
}

#[test]
fn given_domain_set_without_probes_when_planning_then_domain_matches_removed() {
    let f = fixture();
    let criteria = PlanCriteria {
        domains: DomainSet::new(["a.example"], false),
        ..PlanCriteria::default()
    };

    let plan = plan(&f.tree, &HashMap::new(), &criteria);

    let ids: Vec<NodeId> = plan.ids().collect();
    assert_eq!(ids, vec![f.a]);
    assert_eq!(plan.reason(f.a).unwrap().to_string(), "domain match (a.example)");
}

#[rstest]
#[case(200, false)]
#[case(299, false)]
#[case(300, true)]
#[case(404, true)]
#[case(500, true)]
fn given_status_when_planning_then_removed_iff_at_or_above_threshold(
    #[case] status: u16,
    #[case] removed: bool,
) {
    let f = fixture();
    let probes = results(vec![(f.a, ProbeOutcome::Status(status))]);

    let plan = plan(&f.tree, &probes, &PlanCriteria::default());

    assert_eq!(plan.contains(f.a), removed);
}

#[test]
fn given_raised_threshold_when_planning_then_redirects_survive() {
    let f = fixture();
    let probes = results(vec![
        (f.a, ProbeOutcome::Status(302)),
        (f.b, ProbeOutcome::Status(404)),
    ]);
    let criteria = PlanCriteria {
        min_status: 400,
        ..PlanCriteria::default()
    };

    let plan = plan(&f.tree, &probes, &criteria);

    assert!(!plan.contains(f.a));
    assert!(plan.contains(f.b));
}

#[test]
fn given_bookmark_outside_scope_when_planning_then_never_targeted() {
    // Arrange
    let mut f = fixture();
    let other = f.tree.add_folder(f.tree.root(), "Personal").unwrap();
    let d = f
        .tree
        .add_bookmark(other, Bookmark::new("D", "https://a.example/d"))
        .unwrap();
    let probes = results(vec![(d, ProbeOutcome::Status(500))]);
    let criteria = PlanCriteria {
        domains: DomainSet::new(["a.example"], false),
        scope: Scope::new(Some("Work"), Vec::<String>::new()),
        ..PlanCriteria::default()
    };

    // Act
    let plan = plan(&f.tree, &probes, &criteria);

    // Assert
    assert!(plan.contains(f.a));
    assert!(!plan.contains(d));
}

#[test]
fn given_domain_match_and_failed_probe_when_planning_then_marked_once_by_domain() {
    let f = fixture();
    let probes = results(vec![(f.a, ProbeOutcome::Status(404))]);
    let criteria = PlanCriteria {
        domains: DomainSet::new(["a.example"], false),
        ..PlanCriteria::default()
    };

    let plan = plan(&f.tree, &probes, &criteria);

    assert_eq!(plan.len(), 1);
    assert!(matches!(
        plan.reason(f.a),
        Some(RemovalReason::DomainMatch { .. })
    ));
}

#[test]
fn given_any_criteria_when_planning_then_folders_are_never_targeted() {
    let f = fixture();
    let probes = results(vec![(f.work, ProbeOutcome::Status(500))]);
    let criteria = PlanCriteria {
        domains: DomainSet::new(["work"], true),
        ..PlanCriteria::default()
    };

    let plan = plan(&f.tree, &probes, &criteria);

    assert!(!plan.contains(f.work));
    assert!(plan.is_empty());
}

#[test]
fn given_same_inputs_when_planning_twice_then_plans_are_equal() {
    let f = fixture();
    let probes = results(vec![
        (f.b, ProbeOutcome::Failed(FailureKind::Timeout)),
        (f.c, ProbeOutcome::Status(410)),
    ]);

    let first = plan(&f.tree, &probes, &PlanCriteria::default());
    let second = plan(&f.tree, &probes, &PlanCriteria::default());

    assert_eq!(first, second);
}
