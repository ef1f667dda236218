// tests/task_graph_builder.rs

use std::collections::{BTreeSet, HashSet};

use buildgraph::errors::BuildError;
use buildgraph::task::{NodeMap, Relation, Relations, TaskGraphBuilder, TaskId};
use buildgraph_test_utils::builders::{build_graph, dry_run_order, node_map};
use buildgraph_test_utils::init_tracing;

/// Resolve `requested` with every name mentioned anywhere available, then
/// drain the graph in free-node rounds.
fn run_tasks(requested: &[&str], relations: &Relations) -> Vec<String> {
    init_tracing();
    let mut names: BTreeSet<String> = relations.names();
    names.extend(requested.iter().map(|s| s.to_string()));
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let graph = build_graph(relations, requested, &names);
    dry_run_order(&graph)
}

#[test]
fn example_in_the_doc() {
    let mut r = Relations::new();
    r.depends_on("assemble", "compile")
        .reverse_depends_on("compile", "copyVersionForWrapper")
        .reverse_depends_on("copyVersionForWrapper", "assemble");
    assert_eq!(
        run_tasks(&["assemble"], &r),
        vec!["compile", "copyVersionForWrapper", "assemble"]
    );

    let mut r = Relations::new();
    r.depends_on("compile", "clean").depends_on("compile", "example");
    assert_eq!(run_tasks(&["compile"], &r), vec!["clean", "example", "compile"]);
}

#[test]
fn run_after_and_run_before_never_pull_tasks_in() {
    let mut r = Relations::new();
    r.depends_on("compile", "clean").run_after("compile", "example");
    assert_eq!(run_tasks(&["compile"], &r), vec!["clean", "compile"]);

    let mut r = Relations::new();
    r.depends_on("compile", "clean").run_before("compile", "example");
    assert_eq!(run_tasks(&["compile"], &r), vec!["clean", "compile"]);
}

#[test]
fn run_before_and_run_after_order_requested_tasks() {
    let mut r = Relations::new();
    r.depends_on("compile", "clean").run_before("compile", "example");
    assert_eq!(
        run_tasks(&["compile", "example"], &r),
        vec!["clean", "compile", "example"]
    );

    let mut r = Relations::new();
    r.depends_on("compile", "clean").run_after("compile", "example");
    assert_eq!(
        run_tasks(&["compile", "example"], &r),
        vec!["clean", "example", "compile"]
    );
}

#[test]
fn jacoco() {
    let mut r = Relations::new();
    r.depends_on("test", "compileTest")
        .depends_on("test", "compile")
        .depends_on("compileTest", "compile")
        .reverse_depends_on("enableJacoco", "test")
        .reverse_depends_on("compileTest", "enableJacoco")
        .always_run_after("coverage", "test");
    assert_eq!(
        run_tasks(&["test"], &r),
        vec!["compile", "compileTest", "enableJacoco", "test", "coverage"]
    );
}

#[test]
fn simple_orderings() {
    let mut r = Relations::new();
    r.depends_on("assemble", "compile")
        .reverse_depends_on("copyVersionForWrapper", "assemble");
    assert_eq!(
        run_tasks(&["assemble"], &r),
        vec!["compile", "copyVersionForWrapper", "assemble"]
    );

    let mut r = Relations::new();
    r.depends_on("assemble", "compile")
        .always_run_after("copyVersionForWrapper", "compile");
    assert_eq!(
        run_tasks(&["assemble"], &r),
        vec!["compile", "assemble", "copyVersionForWrapper"]
    );

    let mut r = Relations::new();
    r.depends_on("assemble", "compile")
        .depends_on("compile", "copyVersionForWrapper");
    assert_eq!(
        run_tasks(&["assemble"], &r),
        vec!["copyVersionForWrapper", "compile", "assemble"]
    );

    let mut r = Relations::new();
    r.depends_on("assemble", "compile")
        .depends_on("assemble", "copyVersionForWrapper");
    assert_eq!(
        run_tasks(&["assemble"], &r),
        vec!["compile", "copyVersionForWrapper", "assemble"]
    );

    let mut r = Relations::new();
    r.depends_on("assemble", "compile")
        .depends_on("compile", "copyVersionForWrapper")
        .always_run_after("assemble", "copyVersionForWrapper");
    assert_eq!(
        run_tasks(&["assemble"], &r),
        vec!["copyVersionForWrapper", "compile", "assemble"]
    );
}

#[test]
fn sibling_dependents_are_not_pulled_in() {
    let mut r = Relations::new();
    r.depends_on("uploadGithub", "assemble")
        .depends_on("uploadBintray", "assemble");
    assert_eq!(run_tasks(&["uploadGithub"], &r), vec!["assemble", "uploadGithub"]);

    let mut r = Relations::new();
    r.reverse_depends_on("assemble", "uploadGithub")
        .reverse_depends_on("assemble", "uploadBintray");
    assert_eq!(run_tasks(&["uploadGithub"], &r), vec!["assemble", "uploadGithub"]);
}

#[test]
fn depends_on_and_reverse_depends_on_are_symmetric() {
    let pairs: [(&str, &[&str], &[&str]); 4] = [
        ("task1", &["task2a", "task2b"], &["task1"]),
        ("task2a", &["task2a", "task2b"], &["task1", "task2a"]),
        ("task1", &["task2"], &["task1"]),
        ("task2", &["task2"], &["task1", "task2"]),
    ];

    for (requested, dependents, expected) in pairs {
        let mut forward = Relations::new();
        let mut reverse = Relations::new();
        for d in dependents {
            forward.depends_on(*d, "task1");
            reverse.reverse_depends_on("task1", *d);
        }
        assert_eq!(forward, reverse);
        assert_eq!(run_tasks(&[requested], &forward), expected.to_vec());
        assert_eq!(run_tasks(&[requested], &reverse), expected.to_vec());
    }
}

#[test]
fn run_after_is_ignored_on_transitively_discovered_tasks() {
    init_tracing();
    let mut r = Relations::new();
    r.depends_on("test", "compile").run_after("compile", "clean");

    let graph = build_graph(&r, &["test"], &["test", "compile", "clean"]);
    assert!(!graph.contains(&"clean".to_string()));
    assert!(graph.children_of(&"compile".to_string()).is_empty());

    // Even with `clean` requested, `compile` was only discovered through
    // `test`, so its `runAfter` does not apply.
    let graph = build_graph(&r, &["test", "clean"], &["test", "compile", "clean"]);
    assert!(graph.contains(&"clean".to_string()));
    assert!(graph.children_of(&"compile".to_string()).is_empty());
    assert_eq!(
        graph.free_nodes(),
        HashSet::from(["compile".to_string(), "clean".to_string()])
    );
}

#[test]
fn always_run_after_applies_when_task_is_requested() {
    let mut r = Relations::new();
    r.always_run_after("report", "compile");

    let graph = build_graph(&r, &["report"], &["report", "compile"]);
    assert_eq!(graph.children_of(&"report".to_string()), vec!["compile".to_string()]);
}

#[test]
fn always_run_after_applies_when_task_is_discovered() {
    let mut r = Relations::new();
    r.depends_on("package", "report")
        .always_run_after("report", "compile");

    let graph = build_graph(&r, &["package"], &["package", "report", "compile"]);
    assert_eq!(graph.children_of(&"report".to_string()), vec!["compile".to_string()]);
    assert_eq!(dry_run_order(&graph), vec!["compile", "report", "package"]);
}

#[test]
fn always_run_after_applies_when_target_is_requested() {
    let mut r = Relations::new();
    r.always_run_after("report", "compile");

    let graph = build_graph(&r, &["compile"], &["report", "compile"]);
    assert!(graph.contains(&"report".to_string()));
    assert_eq!(graph.children_of(&"report".to_string()), vec!["compile".to_string()]);
}

#[test]
fn every_instance_with_the_same_name_gets_the_edges() {
    init_tracing();
    let mut nodes: NodeMap<String> = node_map(&["clean", "assemble"]);
    nodes.insert(
        "compile".to_string(),
        vec!["java:compile".to_string(), "kotlin:compile".to_string()],
    );
    let mut r = Relations::new();
    r.depends_on("compile", "clean").depends_on("assemble", "compile");

    let graph = TaskGraphBuilder::new(&r)
        .build("p", &[TaskId::parse("assemble")], &nodes)
        .unwrap();

    for instance in ["java:compile", "kotlin:compile"] {
        assert_eq!(graph.children_of(&instance.to_string()), vec!["clean".to_string()]);
    }
    let mut deps = graph.children_of(&"assemble".to_string());
    deps.sort();
    assert_eq!(deps, vec!["java:compile", "kotlin:compile"]);
}

#[test]
fn unknown_requested_task_is_an_error() {
    let r = Relations::new();
    let err = TaskGraphBuilder::new(&r)
        .build("p", &[TaskId::parse("nope")], &node_map(&["compile"]))
        .unwrap_err();
    assert!(matches!(err, BuildError::UnknownTask(name) if name == "nope"));
}

#[test]
fn task_known_elsewhere_is_skipped_in_this_project() {
    let r = Relations::new();
    let known: BTreeSet<String> = ["compile", "javadoc"].iter().map(|s| s.to_string()).collect();
    let graph = TaskGraphBuilder::new(&r)
        .with_known_tasks(&known)
        .build(
            "p",
            &[TaskId::parse("compile"), TaskId::parse("javadoc")],
            &node_map(&["compile"]),
        )
        .unwrap();
    assert_eq!(graph.nodes(), vec!["compile".to_string()]);
}

#[test]
fn qualified_ids_for_other_projects_are_dropped() {
    let r = Relations::new();
    let graph = TaskGraphBuilder::new(&r)
        .build(
            "core",
            &[TaskId::parse("core:compile"), TaskId::parse("web:assemble")],
            &node_map(&["compile", "assemble"]),
        )
        .unwrap();
    assert_eq!(graph.nodes(), vec!["compile".to_string()]);
}

#[test]
fn missing_dependency_is_skipped() {
    let mut r = Relations::new();
    r.depends_on("compile", "generateSources");
    let graph = build_graph(&r, &["compile"], &["compile"]);
    assert_eq!(graph.nodes(), vec!["compile".to_string()]);
    assert!(graph.free_nodes().contains("compile"));
}

#[test]
fn relation_edges_point_from_dependent_to_dependency() {
    assert_eq!(Relation::DependsOn.edge("a", "b"), ("a", "b"));
    assert_eq!(Relation::RunAfter.edge("a", "b"), ("a", "b"));
    assert_eq!(Relation::AlwaysRunAfter.edge("a", "b"), ("a", "b"));
    assert_eq!(Relation::RunBefore.edge("a", "b"), ("b", "a"));
    assert!(Relation::DependsOn.applies_transitively());
    assert!(!Relation::RunBefore.applies_transitively());
}

#[test]
fn task_ids_parse_project_qualifiers() {
    let id = TaskId::parse("core:compile");
    assert_eq!(id.project(), Some("core"));
    assert_eq!(id.task(), "compile");
    assert!(id.matches("core"));
    assert!(!id.matches("web"));
    assert_eq!(id.to_string(), "core:compile");

    let bare = TaskId::parse("compile");
    assert_eq!(bare.project(), None);
    assert!(bare.matches("anything"));
}
