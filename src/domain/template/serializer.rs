// Reprinting trees back into template source

use std::fmt::{self, Display, Formatter, Write};

use super::ast::{Arg, Branch, Command, Node, Pipe, Tree, TreeSet};
use super::quote::quote;

/// Print every tree of a set: the top-level body first, then each named
/// tree wrapped in a `define` clause, in definition order.
pub fn serialize(trees: &TreeSet) -> String {
    let mut out = String::new();
    if let Some(root) = trees.root() {
        out.push_str(&serialize_list(&root.root));
    }
    for tree in trees.iter().filter(|tree| !tree.is_root()) {
        out.push_str(&serialize_definition(tree));
    }
    out
}

/// Concatenate the source form of each node
pub fn serialize_list(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        // writing into a String cannot fail
        let _ = write!(out, "{}", node);
    }
    out
}

pub fn serialize_definition(tree: &Tree) -> String {
    define(&tree.name, &serialize_list(&tree.root))
}

/// Wrap an already printed body in a `define` clause
pub fn define(name: &str, body: &str) -> String {
    format!("{{{{define {}}}}}{}{{{{end}}}}", quote(name), body)
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(text) | Node::Raw(text) => f.write_str(text),
            Node::Comment(text) => write!(f, "{{{{{}}}}}", text),
            Node::Action(pipe) => write!(f, "{{{{{}}}}}", pipe),
            Node::If(branch) => write_branch(f, "if", branch),
            Node::Range(branch) => write_branch(f, "range", branch),
            Node::With(branch) => write_branch(f, "with", branch),
            Node::Template { name, pipe: None } => write!(f, "{{{{template {}}}}}", quote(name)),
            Node::Template {
                name,
                pipe: Some(pipe),
            } => write!(f, "{{{{template {} {}}}}}", quote(name), pipe),
            Node::Break => f.write_str("{{break}}"),
            Node::Continue => f.write_str("{{continue}}"),
        }
    }
}

fn write_branch(f: &mut Formatter<'_>, keyword: &str, branch: &Branch) -> fmt::Result {
    write!(f, "{{{{{} {}}}}}", keyword, branch.pipe)?;
    f.write_str(&serialize_list(&branch.list))?;
    if let Some(else_list) = &branch.else_list {
        f.write_str("{{else}}")?;
        f.write_str(&serialize_list(else_list))?;
    }
    f.write_str("{{end}}")
}

impl Display for Pipe {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.decl.is_empty() {
            f.write_str(&self.decl.join(", "))?;
            f.write_str(if self.is_assign { " = " } else { " := " })?;
        }
        for (i, command) in self.cmds.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", command)?;
        }
        Ok(())
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match arg {
                Arg::Pipe(pipe) => write!(f, "({})", pipe)?,
                arg => write!(f, "{}", arg)?,
            }
        }
        Ok(())
    }
}

impl Display for Arg {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Identifier(ident) => f.write_str(ident),
            Arg::Field(idents) => {
                for ident in idents {
                    write!(f, ".{}", ident)?;
                }
                Ok(())
            }
            Arg::Variable(idents) => f.write_str(&idents.join(".")),
            Arg::Dot => f.write_str("."),
            Arg::Nil => f.write_str("nil"),
            Arg::Bool(value) => write!(f, "{}", value),
            Arg::Number(text) => f.write_str(text),
            Arg::String { quoted, .. } => f.write_str(quoted),
            Arg::Pipe(pipe) => write!(f, "{}", pipe),
            Arg::Chain { node, fields } => {
                match node.as_ref() {
                    Arg::Pipe(pipe) => write!(f, "({})", pipe)?,
                    node => write!(f, "{}", node)?,
                }
                for field in fields {
                    write!(f, ".{}", field)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::template::parser::TemplateParser;
    use crate::domain::template::registry::FunctionRegistry;

    fn reprint(text: &str) -> String {
        let functions = FunctionRegistry::with_functions(["xxx", "yyy", "zzz"]);
        let trees = TemplateParser::new("test", &functions).parse(text).unwrap();
        serialize(&trees)
    }

    #[test]
    fn test_reprint_plain_text() {
        assert_eq!(reprint("ABC"), "ABC");
        assert_eq!(reprint(""), "");
    }

    #[test]
    fn test_reprint_normalizes_spacing_and_trim_markers() {
        assert_eq!(reprint("{{xxx}}ABC"), "{{xxx}}ABC");
        assert_eq!(reprint("{{- xxx -}} ABC"), "{{xxx}}ABC");
        assert_eq!(reprint(r#"{{ xxx "yyy"}} ABC"#), r#"{{xxx "yyy"}} ABC"#);
        assert_eq!(reprint("{{xxx|len}}ABC{{yyy|zzz}}"), "{{xxx | len}}ABC{{yyy | zzz}}");
    }

    #[test]
    fn test_reprint_branches() {
        assert_eq!(
            reprint("{{if .v}}a{{else}}b{{end}}{{range $i, $e := .l}}{{$e}}{{end}}"),
            "{{if .v}}a{{else}}b{{end}}{{range $i, $e := .l}}{{$e}}{{end}}"
        );
        assert_eq!(
            reprint("{{with $x = .v}}{{.}}{{else}}none{{end}}"),
            "{{with $x = .v}}{{.}}{{else}}none{{end}}"
        );
    }

    #[test]
    fn test_reprint_else_if_as_nested_if() {
        assert_eq!(
            reprint("{{if .a}}1{{else if .b}}2{{end}}"),
            "{{if .a}}1{{else}}{{if .b}}2{{end}}{{end}}"
        );
    }

    #[test]
    fn test_reprint_literals_keep_spelling() {
        assert_eq!(
            reprint("{{printf `%d` 0x1F 'a' 1.5e3 true nil}}"),
            "{{printf `%d` 0x1F 'a' 1.5e3 true nil}}"
        );
    }

    #[test]
    fn test_reprint_parenthesized_and_chains() {
        assert_eq!(reprint("{{(xxx .a).b}}"), "{{(xxx .a).b}}");
        assert_eq!(reprint("{{len (index .m \"k\")}}"), "{{len (index .m \"k\")}}");
        assert_eq!(reprint("{{$.a.b}}"), "{{$.a.b}}");
    }

    #[test]
    fn test_reprint_block_as_define() {
        assert_eq!(
            reprint(r#"{{block "A" .}}ABC{{end}}"#),
            r#"{{template "A" .}}{{define "A"}}ABC{{end}}"#
        );
    }

    #[test]
    fn test_reprint_template_and_loop_control() {
        assert_eq!(
            reprint(r#"{{template `x`}}{{range .}}{{break}}{{continue}}{{end}}"#),
            r#"{{template "x"}}{{range .}}{{break}}{{continue}}{{end}}"#
        );
    }

    #[test]
    fn test_raw_node_prints_verbatim() {
        assert_eq!(serialize_list(&[Node::Raw("{{ not parsed".to_string())]), "{{ not parsed");
    }

    #[test]
    fn test_define_quotes_name() {
        assert_eq!(define("a\"b", "x"), r#"{{define "a\"b"}}x{{end}}"#);
    }
}
