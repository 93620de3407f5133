use crate::error::{AppError, Result};
use log;
#[cfg(feature = "serde_support")]
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "lowercase"))]
pub enum NodeKind {
    File,
    Directory,
}

/// Directory hierarchy implied by the included files. Directories without
/// included descendants never appear because nodes are only created from
/// file paths.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
pub struct TreeNode {
    pub name: String,
    #[cfg_attr(feature = "serde_support", serde(rename = "type"))]
    pub kind: NodeKind,
    #[cfg_attr(
        feature = "serde_support",
        serde(skip_serializing_if = "Vec::is_empty")
    )]
    pub children: Vec<TreeNode>,
}

pub fn build_tree<'a>(rel_paths: impl IntoIterator<Item = &'a str>) -> Vec<TreeNode> {
    let mut roots: Vec<TreeNode> = Vec::new();
    let mut count = 0usize;
    for rel_path in rel_paths {
        let components: Vec<&str> = rel_path.split('/').filter(|c| !c.is_empty()).collect();
        if components.is_empty() {
            continue;
        }
        if let Err(e) = insert_node(&mut roots, &components) {
            log::error!("Error inserting \"{}\" into project tree: {}", rel_path, e);
        }
        count += 1;
    }
    log::debug!("Project tree built from {} paths", count);
    roots
}

fn insert_node(level: &mut Vec<TreeNode>, components: &[&str]) -> Result<()> {
    let Some((name, rest)) = components.split_first() else {
        return Ok(());
    };
    let is_last = rest.is_empty();

    // Siblings stay sorted by byte order, matching traversal order.
    let index = match level.binary_search_by(|node| node.name.as_str().cmp(name)) {
        Ok(index) => index,
        Err(insertion_point) => {
            level.insert(
                insertion_point,
                TreeNode {
                    name: name.to_string(),
                    kind: if is_last {
                        NodeKind::File
                    } else {
                        NodeKind::Directory
                    },
                    children: Vec::new(),
                },
            );
            insertion_point
        }
    };

    let node = &mut level[index];
    if is_last {
        return Ok(());
    }
    if node.kind == NodeKind::File {
        return Err(AppError::InvalidArgument(format!(
            "Tree conflict: '{}' is both a file and a directory",
            name
        )));
    }
    insert_node(&mut node.children, rest)
}

/// Renders the tree with box-drawing guides under a `<root>/` line.
pub fn render_tree(root_label: &str, nodes: &[TreeNode]) -> String {
    let mut out = format!("{}/\n", root_label);
    render_level(nodes, "", &mut out);
    out
}

fn render_level(nodes: &[TreeNode], prefix: &str, out: &mut String) {
    for (i, node) in nodes.iter().enumerate() {
        let last = i + 1 == nodes.len();
        out.push_str(prefix);
        out.push_str(if last { "└── " } else { "├── " });
        out.push_str(&node.name);
        if node.kind == NodeKind::Directory {
            out.push('/');
        }
        out.push('\n');
        if !node.children.is_empty() {
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            render_level(&node.children, &child_prefix, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_contains_only_ancestors_of_files() {
        let roots = build_tree(["README.md", "src/app/main.py", "src/lib.py"]);
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].name, "README.md");
        assert_eq!(roots[1].kind, NodeKind::Directory);
        assert_eq!(roots[1].children[0].name, "app");
        assert_eq!(roots[1].children[1].name, "lib.py");
    }

    #[test]
    fn rendering_uses_guides() {
        let roots = build_tree(["a/x.txt", "a/y.txt", "b.txt"]);
        assert_eq!(
            render_tree("demo", &roots),
            "demo/\n├── a/\n│   ├── x.txt\n│   └── y.txt\n└── b.txt\n"
        );
    }

    #[test]
    fn conflicting_paths_are_reported_not_fatal() {
        let roots = build_tree(["a", "a/b"]);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].kind, NodeKind::File);
    }

    #[test]
    fn empty_input_renders_root_only() {
        assert_eq!(render_tree("demo", &build_tree(Vec::<&str>::new())), "demo/\n");
    }
}
