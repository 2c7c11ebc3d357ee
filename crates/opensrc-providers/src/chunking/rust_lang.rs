//! Rust AST chunker: one chunk per top-level item, methods nested
//! under their `impl`/`trait` block tagged with it as `parent`.

use opensrc_domain::chunk::{ChunkKind, CodeChunk};
use tree_sitter::{Node, Parser};

pub fn chunk(content: &str, file_path: &str) -> Option<Vec<CodeChunk>> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_rust::LANGUAGE.into()).ok()?;
    let tree = parser.parse(content, None)?;

    let mut out = Vec::new();
    walk(tree.root_node(), content, file_path, &mut Vec::new(), &mut out);
    (!out.is_empty()).then_some(out)
}

fn walk(node: Node, content: &str, file_path: &str, parents: &mut Vec<String>, out: &mut Vec<CodeChunk>) {
    match node.kind() {
        "function_item" => {
            let in_impl_or_trait = node
                .parent()
                .filter(|p| p.kind() == "declaration_list")
                .and_then(|p| p.parent())
                .is_some_and(|gp| matches!(gp.kind(), "impl_item" | "trait_item"));
            let kind = if in_impl_or_trait { ChunkKind::Method } else { ChunkKind::Function };
            emit(node, content, file_path, kind, field_text(node, "name", content), parents, out);
        }
        "struct_item" => emit(node, content, file_path, ChunkKind::Struct, field_text(node, "name", content), parents, out),
        "enum_item" => emit(node, content, file_path, ChunkKind::Enum, field_text(node, "name", content), parents, out),
        "macro_definition" => emit(node, content, file_path, ChunkKind::Macro, field_text(node, "name", content), parents, out),
        "trait_item" => {
            let name = field_text(node, "name", content).unwrap_or_else(|| "trait".to_string());
            emit(node, content, file_path, ChunkKind::Trait, Some(name.clone()), parents, out);
            recurse_children(node, content, file_path, &name, parents, out);
        }
        "impl_item" => {
            let type_text = field_text(node, "type", content).unwrap_or_else(|| "?".to_string());
            let name = match field_text(node, "trait", content) {
                Some(trait_name) => format!("impl {trait_name} for {type_text}"),
                None => format!("impl {type_text}"),
            };
            emit(node, content, file_path, ChunkKind::Impl, Some(name.clone()), parents, out);
            recurse_children(node, content, file_path, &name, parents, out);
        }
        "mod_item" => {
            let name = field_text(node, "name", content).unwrap_or_else(|| "mod".to_string());
            emit(node, content, file_path, ChunkKind::Mod, Some(name.clone()), parents, out);
            recurse_children(node, content, file_path, &name, parents, out);
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(child, content, file_path, parents, out);
            }
        }
    }
}

fn recurse_children(node: Node, content: &str, file_path: &str, parent_name: &str, parents: &mut Vec<String>, out: &mut Vec<CodeChunk>) {
    parents.push(parent_name.to_string());
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, content, file_path, parents, out);
    }
    parents.pop();
}

fn field_text(node: Node, field: &str, content: &str) -> Option<String> {
    node.child_by_field_name(field).and_then(|n| n.utf8_text(content.as_bytes()).ok()).map(str::to_string)
}

#[allow(clippy::too_many_arguments)]
fn emit(
    node: Node,
    content: &str,
    file_path: &str,
    kind: ChunkKind,
    identifier: Option<String>,
    parents: &[String],
    out: &mut Vec<CodeChunk>,
) {
    let text = node.utf8_text(content.as_bytes()).unwrap_or_default().to_string();
    out.push(CodeChunk {
        file: file_path.to_string(),
        identifier: identifier.unwrap_or_else(|| "anonymous".to_string()),
        kind,
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        content: text,
        parent: parents.last().cloned(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_top_level_items() {
        let src = "struct Foo;\nfn bar() {}\nenum Baz { A, B }\n";
        let chunks = chunk(src, "lib.rs").unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().any(|c| c.kind == ChunkKind::Struct && c.identifier == "Foo"));
        assert!(chunks.iter().any(|c| c.kind == ChunkKind::Function && c.identifier == "bar"));
        assert!(chunks.iter().any(|c| c.kind == ChunkKind::Enum && c.identifier == "Baz"));
    }

    #[test]
    fn methods_get_impl_block_as_parent() {
        let src = "struct Foo;\nimpl Foo {\n    fn bar(&self) {}\n}\n";
        let chunks = chunk(src, "lib.rs").unwrap();
        let method = chunks.iter().find(|c| c.kind == ChunkKind::Method).unwrap();
        assert_eq!(method.identifier, "bar");
        assert_eq!(method.parent.as_deref(), Some("impl Foo"));
    }

    #[test]
    fn trait_impl_names_both_sides() {
        let src = "trait Greet { fn hi(&self); }\nstruct Foo;\nimpl Greet for Foo {\n    fn hi(&self) {}\n}\n";
        let chunks = chunk(src, "lib.rs").unwrap();
        let impl_chunk = chunks.iter().find(|c| c.kind == ChunkKind::Impl).unwrap();
        assert_eq!(impl_chunk.identifier, "impl Greet for Foo");
    }
}
