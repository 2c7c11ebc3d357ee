//! JS/TS/TSX AST chunker: functions, classes and their methods,
//! interfaces, type aliases, enums, and top-level `const x = () => …`
//! declarations.

use opensrc_domain::chunk::{ChunkKind, CodeChunk};
use tree_sitter::{Node, Parser};

pub fn chunk(content: &str, file_path: &str, ext: &str) -> Option<Vec<CodeChunk>> {
    let language: tree_sitter::Language = match ext {
        "ts" | "mts" | "cts" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        "tsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
        _ => tree_sitter_javascript::LANGUAGE.into(),
    };
    let mut parser = Parser::new();
    parser.set_language(&language).ok()?;
    let tree = parser.parse(content, None)?;

    let mut out = Vec::new();
    walk(tree.root_node(), content, file_path, &mut Vec::new(), &mut out);
    (!out.is_empty()).then_some(out)
}

fn walk(node: Node, content: &str, file_path: &str, parents: &mut Vec<String>, out: &mut Vec<CodeChunk>) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            emit(node, content, file_path, ChunkKind::Function, field_text(node, "name", content), parents, out);
        }
        "method_definition" => {
            emit(node, content, file_path, ChunkKind::Method, field_text(node, "name", content), parents, out);
        }
        "class_declaration" | "abstract_class_declaration" => {
            let name = field_text(node, "name", content).unwrap_or_else(|| "class".to_string());
            emit(node, content, file_path, ChunkKind::Class, Some(name.clone()), parents, out);
            parents.push(name);
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(child, content, file_path, parents, out);
            }
            parents.pop();
            return;
        }
        "interface_declaration" => {
            emit(node, content, file_path, ChunkKind::Interface, field_text(node, "name", content), parents, out);
            return;
        }
        "type_alias_declaration" => {
            emit(node, content, file_path, ChunkKind::Type, field_text(node, "name", content), parents, out);
            return;
        }
        "enum_declaration" => {
            emit(node, content, file_path, ChunkKind::Enum, field_text(node, "name", content), parents, out);
            return;
        }
        "lexical_declaration" | "variable_declaration" => {
            if let Some(name) = top_level_function_variable_name(node, content) {
                emit(node, content, file_path, ChunkKind::Variable, Some(name), parents, out);
                return;
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, content, file_path, parents, out);
    }
}

/// Matches `const name = function(...) {...}` / `const name = (...) => {...}`
/// — a top-level variable whose initializer is a function value, per the
/// chunker's `Variable` kind doc.
fn top_level_function_variable_name(node: Node, content: &str) -> Option<String> {
    let mut cursor = node.walk();
    for declarator in node.children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let value = declarator.child_by_field_name("value")?;
        if matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
            return declarator
                .child_by_field_name("name")
                .and_then(|n| n.utf8_text(content.as_bytes()).ok())
                .map(str::to_string);
        }
    }
    None
}

fn field_text(node: Node, field: &str, content: &str) -> Option<String> {
    node.child_by_field_name(field).and_then(|n| n.utf8_text(content.as_bytes()).ok()).map(str::to_string)
}

fn emit(node: Node, content: &str, file_path: &str, kind: ChunkKind, identifier: Option<String>, parents: &[String], out: &mut Vec<CodeChunk>) {
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
    fn extracts_function_and_class_method() {
        let src = "function top() {}\nclass Widget {\n  render() {}\n}\n";
        let chunks = chunk(src, "widget.js", "js").unwrap();
        assert!(chunks.iter().any(|c| c.kind == ChunkKind::Function && c.identifier == "top"));
        let method = chunks.iter().find(|c| c.kind == ChunkKind::Method).unwrap();
        assert_eq!(method.identifier, "render");
        assert_eq!(method.parent.as_deref(), Some("Widget"));
    }

    #[test]
    fn extracts_arrow_function_variable() {
        let src = "const handler = (req, res) => { res.send('ok'); };\n";
        let chunks = chunk(src, "handler.js", "js").unwrap();
        assert!(chunks.iter().any(|c| c.kind == ChunkKind::Variable && c.identifier == "handler"));
    }

    #[test]
    fn extracts_ts_interface_and_type() {
        let src = "interface Props { name: string }\ntype Id = string | number;\n";
        let chunks = chunk(src, "types.ts", "ts").unwrap();
        assert!(chunks.iter().any(|c| c.kind == ChunkKind::Interface && c.identifier == "Props"));
        assert!(chunks.iter().any(|c| c.kind == ChunkKind::Type && c.identifier == "Id"));
    }
}
