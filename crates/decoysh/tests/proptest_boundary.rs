//! Property-based tests for the root boundary, output clipping and the
//! snapshot index
//!
//! Run with: cargo test --test proptest_boundary

use decoysh::{
    Dispatch, FileSystemNode, Limits, NullAuditLog, ROOT_PATH, Router, ScenarioLocator, Session,
    VirtualFileSystem, resolve,
};
use proptest::prelude::*;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn cd_target_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("..".to_string()),
        Just("../..".to_string()),
        Just("../../..".to_string()),
        Just("/".to_string()),
        Just("/home".to_string()),
        Just(ROOT_PATH.to_string()),
        Just("/etc".to_string()),
        Just("logs".to_string()),
        Just("logs/..".to_string()),
        Just("logs/app".to_string()),
        Just("README.txt".to_string()),
        Just(".".to_string()),
        Just("".to_string()),
        "[a-z./]{1,12}",
    ]
}

fn tree_strategy() -> impl Strategy<Value = FileSystemNode> {
    let leaf = ("[a-z]{1,4}", 0..4096u64).prop_map(|(name, size)| FileSystemNode::file(name, size));
    leaf.prop_recursive(4, 48, 6, |inner| {
        ("[a-z]{1,4}", prop::collection::vec(inner, 0..6))
            .prop_map(|(name, children)| FileSystemNode::dir(name, children))
    })
}

fn snapshot_json() -> String {
    let root = FileSystemNode::dir(
        "user",
        vec![
            FileSystemNode::file("README.txt", 10),
            FileSystemNode::dir("logs", vec![FileSystemNode::dir("app", vec![])]),
            FileSystemNode::dir("bin", vec![]),
        ],
    );
    serde_json::to_string(&root).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Resolved paths always stay under the root boundary
    #[test]
    fn resolve_stays_inside_root(target in cd_target_strategy()) {
        for cwd in [ROOT_PATH, "/home/user/logs", "/tmp"] {
            if let Ok(path) = resolve(cwd, &target) {
                prop_assert!(path.to_string().starts_with(ROOT_PATH));
            }
        }
    }

    /// No sequence of cd commands moves a session outside the boundary
    #[test]
    fn cd_never_escapes_root(targets in prop::collection::vec(cd_target_strategy(), 1..12)) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("default");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("fs.json"), snapshot_json()).unwrap();
        let router = Router::new(ScenarioLocator::new(tmp.path()));
        let mut session = Session::new("127.0.0.1:1".parse().unwrap(), Arc::new(NullAuditLog));

        runtime().block_on(async {
            for target in &targets {
                router.dispatch(&mut session, &format!("cd {}", target)).await;
                assert!(session.cwd().starts_with(ROOT_PATH), "escaped to {}", session.cwd());
            }
        });
    }

    /// Clipped output is exactly the limit when over it, untouched otherwise
    #[test]
    fn clipping_is_exact(text in "[ -~\n]{0,300}", max in 1usize..200) {
        let d = Dispatch::clipped(text.clone(), max);
        if text.len() > max {
            prop_assert!(d.truncated);
            prop_assert_eq!(d.output.len(), max);
            prop_assert!(text.starts_with(&d.output));
        } else {
            prop_assert!(!d.truncated);
            prop_assert_eq!(d.output, text);
        }
    }

    /// Multibyte text is never split inside a character
    #[test]
    fn clipping_respects_char_boundaries(text in "\\PC{0,80}", max in 0usize..120) {
        let d = Dispatch::clipped(text.clone(), max);
        prop_assert!(d.output.len() <= max);
        prop_assert!(text.starts_with(&d.output));
        prop_assert_eq!(d.truncated, text.len() > max);
    }

    /// Router output respects the configured limit
    #[test]
    fn dispatch_output_bounded(len in 0usize..400, max in 1usize..256) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("default").join("txtcmds");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("dmesg.txt"), "y".repeat(len)).unwrap();
        let router = Router::new(ScenarioLocator::new(tmp.path()))
            .with_limits(Limits::new().max_output(max));
        let mut session = Session::new("127.0.0.1:1".parse().unwrap(), Arc::new(NullAuditLog));

        let reply = runtime().block_on(router.dispatch(&mut session, "dmesg"));
        prop_assert_eq!(reply.truncated, len > max);
        prop_assert_eq!(reply.output.len(), len.min(max));
    }

    /// Every indexed path maps back to the node found by walking the tree
    #[test]
    fn index_round_trip(tree in tree_strategy()) {
        let root = FileSystemNode::dir("user", vec![tree]).normalized();
        let fs = VirtualFileSystem::build(root);
        for path in fs.paths() {
            let mut node = fs.root();
            for segment in path {
                node = node
                    .children
                    .iter()
                    .find(|c| &c.name == segment)
                    .expect("indexed path must exist in tree");
            }
            let indexed = fs.get_node(path).unwrap();
            prop_assert!(Arc::ptr_eq(node, indexed));
        }
    }
}
