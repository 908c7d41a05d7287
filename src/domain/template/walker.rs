// Depth-first traversal that replaces include directives in place

use std::path::Path;

use tracing::warn;

use super::ast::Node;
use crate::error::LoadError;

/// Turns an include directive into the text that replaces it
pub trait ResolveInclude {
    /// `including_file` is the cleaned path of the file holding the directive
    fn resolve(&mut self, including_file: &Path, target: &str) -> Result<String, LoadError>;
}

/// Walk `nodes` in document order, descending into every branch of `if`,
/// `range` and `with`, and replace each include directive with a raw node
/// holding its resolved text.
pub fn walk<R>(including_file: &Path, nodes: &mut [Node], resolver: &mut R) -> Result<(), LoadError>
where
    R: ResolveInclude + ?Sized,
{
    for node in nodes.iter_mut() {
        if let Some(target) = node.include_target().map(str::to_owned) {
            let text = resolver.resolve(including_file, &target)?;
            *node = Node::Raw(text);
            continue;
        }
        match node {
            Node::If(branch) | Node::Range(branch) | Node::With(branch) => {
                walk(including_file, &mut branch.list, resolver)?;
                if let Some(else_list) = &mut branch.else_list {
                    walk(including_file, else_list, resolver)?;
                }
            }
            node if node.is_unresolvable_include() => {
                warn!(
                    file = %including_file.display(),
                    action = %node,
                    "include needs a single string literal argument; leaving action unchanged"
                );
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::template::parser::TemplateParser;
    use crate::domain::template::registry::FunctionRegistry;
    use crate::domain::template::serializer::serialize_list;
    use std::collections::HashMap;

    /// Resolves targets from a fixed map and records every request
    #[derive(Default)]
    struct MapResolver {
        files: HashMap<String, String>,
        requests: Vec<(String, String)>,
    }

    impl ResolveInclude for MapResolver {
        fn resolve(&mut self, including_file: &Path, target: &str) -> Result<String, LoadError> {
            self.requests
                .push((including_file.display().to_string(), target.to_string()));
            self.files
                .get(target)
                .cloned()
                .ok_or_else(|| LoadError::NotFound {
                    path: target.into(),
                })
        }
    }

    fn walk_text(text: &str, resolver: &mut MapResolver) -> Result<String, LoadError> {
        let functions = FunctionRegistry::with_functions(["name"]);
        let trees = TemplateParser::new("test", &functions).parse(text).unwrap();
        let mut root = trees.root().unwrap().root.clone();
        walk(Path::new("/dir/page"), &mut root, resolver)?;
        Ok(serialize_list(&root))
    }

    fn resolver(files: &[(&str, &str)]) -> MapResolver {
        MapResolver {
            files: files
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            requests: Vec::new(),
        }
    }

    #[test]
    fn test_walk_replaces_top_level_include() {
        let mut resolver = resolver(&[("a", "AAA")]);
        assert_eq!(walk_text(r#"x{{include "a"}}y"#, &mut resolver).unwrap(), "xAAAy");
        assert_eq!(
            resolver.requests,
            vec![("/dir/page".to_string(), "a".to_string())]
        );
    }

    #[test]
    fn test_walk_descends_into_all_branches() {
        let mut resolver = resolver(&[("a", "A"), ("b", "B"), ("c", "C"), ("d", "D")]);
        let out = walk_text(
            r#"{{if .x}}{{include "a"}}{{else}}{{include "b"}}{{end}}{{range .l}}{{with .y}}{{include "c"}}{{end}}{{else}}{{include "d"}}{{end}}"#,
            &mut resolver,
        )
        .unwrap();
        assert_eq!(out, "{{if .x}}A{{else}}B{{end}}{{range .l}}{{with .y}}C{{end}}{{else}}D{{end}}");
        let targets: Vec<&str> = resolver.requests.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(targets, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_walk_leaves_non_literal_includes() {
        let mut resolver = resolver(&[]);
        let out = walk_text(
            r#"{{include .path}}{{include "a" "b"}}{{include "a" | name}}"#,
            &mut resolver,
        )
        .unwrap();
        assert_eq!(out, r#"{{include .path}}{{include "a" "b"}}{{include "a" | name}}"#);
        assert!(resolver.requests.is_empty());
    }

    #[test]
    fn test_walk_propagates_errors() {
        let mut resolver = resolver(&[]);
        let err = walk_text(r#"{{if .x}}{{include "missing"}}{{end}}"#, &mut resolver).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }
}
