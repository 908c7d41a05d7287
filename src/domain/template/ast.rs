// Syntax tree types for parsed templates

/// Name of the tree holding a file's top-level body
pub const ROOT_NAME: &str = "";

/// A single node of a statement list
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    /// Comment text including the `/*` `*/` markers
    Comment(String),
    Action(Pipe),
    If(Branch),
    Range(Branch),
    With(Branch),
    Template {
        name: String,
        pipe: Option<Pipe>,
    },
    Break,
    Continue,
    /// Resolved include content, printed verbatim
    Raw(String),
}

impl Node {
    /// Literal target path when this node is an include directive:
    /// a single-command action `include "path"` with no declarations.
    pub fn include_target(&self) -> Option<&str> {
        let Node::Action(pipe) = self else {
            return None;
        };
        if !pipe.decl.is_empty() || pipe.cmds.len() != 1 {
            return None;
        }
        match pipe.cmds[0].args.as_slice() {
            [Arg::Identifier(ident), Arg::String { text, .. }] if ident == "include" => {
                Some(text.as_str())
            }
            _ => None,
        }
    }

    /// True for actions that call `include` but are not resolvable directives
    pub fn is_unresolvable_include(&self) -> bool {
        match self {
            Node::Action(pipe) if self.include_target().is_none() => pipe
                .cmds
                .iter()
                .any(|cmd| matches!(cmd.args.first(), Some(Arg::Identifier(id)) if id == "include")),
            _ => false,
        }
    }
}

/// Shared shape of `if`, `range` and `with`
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub pipe: Pipe,
    pub list: Vec<Node>,
    pub else_list: Option<Vec<Node>>,
}

/// A pipeline with optional variable declarations
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipe {
    pub is_assign: bool,
    /// Declared variable names such as `$x`
    pub decl: Vec<String>,
    pub cmds: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Command {
    pub args: Vec<Arg>,
}

/// Command operand
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Identifier(String),
    /// `.A.B` stored as `["A", "B"]`
    Field(Vec<String>),
    /// `$x.A` stored as `["$x", "A"]`
    Variable(Vec<String>),
    Dot,
    Nil,
    Bool(bool),
    /// Numbers and char constants keep their source spelling
    Number(String),
    String {
        quoted: String,
        text: String,
    },
    Pipe(Box<Pipe>),
    Chain {
        node: Box<Arg>,
        fields: Vec<String>,
    },
}

/// A named statement list
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub name: String,
    pub root: Vec<Node>,
}

impl Tree {
    pub fn new(name: impl Into<String>, root: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    pub fn is_root(&self) -> bool {
        self.name == ROOT_NAME
    }

    /// A tree holding nothing but whitespace and comments
    pub fn is_empty(&self) -> bool {
        is_empty_list(&self.root)
    }
}

fn is_empty_list(nodes: &[Node]) -> bool {
    nodes.iter().all(|node| match node {
        Node::Text(text) => text.trim().is_empty(),
        Node::Comment(_) => true,
        _ => false,
    })
}

/// All trees produced by parsing one file, in definition order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TreeSet {
    trees: Vec<Tree>,
}

impl TreeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Tree> {
        self.trees.iter().find(|tree| tree.name == name)
    }

    pub fn root(&self) -> Option<&Tree> {
        self.get(ROOT_NAME)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Add a tree, replacing an existing empty definition of the same name.
    /// Returns false when both the existing and the new tree have content.
    pub fn add(&mut self, tree: Tree) -> bool {
        match self.trees.iter_mut().find(|t| t.name == tree.name) {
            None => {
                self.trees.push(tree);
                true
            }
            Some(existing) if existing.is_empty() => {
                *existing = tree;
                true
            }
            Some(_) => tree.is_empty(),
        }
    }
}

impl IntoIterator for TreeSet {
    type Item = Tree;
    type IntoIter = std::vec::IntoIter<Tree>;

    fn into_iter(self) -> Self::IntoIter {
        self.trees.into_iter()
    }
}
