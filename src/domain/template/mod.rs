// Template machinery: lexing, parsing, include resolution and reprinting
//
// Files are parsed without executing anything, include directives are
// replaced by the resolved text of the target file, and the mutated tree is
// printed back as template source.

mod adapter;
mod ast;
mod lexer;
mod parser;
mod quote;
mod registry;
mod resolver;
mod serializer;
mod walker;

pub use adapter::{FunctionMode, SyntaxAdapter, DEFAULT_MAX_DISCOVERY_ATTEMPTS};
pub use ast::{Arg, Branch, Command, Node, Pipe, Tree, TreeSet, ROOT_NAME};
pub use parser::TemplateParser;
pub use registry::{FunctionRegistry, BUILTIN_FUNCTIONS, INCLUDE};
pub use resolver::{Definition, IncludeResolver, Resolved};
pub use serializer::{serialize, serialize_list};
pub use walker::{walk, ResolveInclude};
