use lsp_types as lsp;
use vala_core::ast::{Ast, DataType, NodeID, NodeKind};

/// How the completion request was triggered. Only member access is
/// completed; other cursors yield nothing.
#[derive(Copy, Clone, PartialEq)]
pub enum Trigger {
    Member,
    PointerMember,
}

/// Examines the byte just before the cursor and retargets it onto the
/// access operator: one column left for `.`, two for `->`. A bare `>`
/// is not an access.
pub fn classify_trigger(line: &str, character: u32) -> Option<(Trigger, u32)> {
    let bytes = line.as_bytes();
    let cursor = character as usize;
    if cursor == 0 || cursor > bytes.len() {
        return None;
    }
    match bytes[cursor - 1] {
        b'.' => Some((Trigger::Member, character - 1)),
        b'>' if cursor >= 2 && bytes[cursor - 2] == b'-' => {
            Some((Trigger::PointerMember, character - 2))
        }
        _ => None,
    }
}

/// Resolves the node under the cursor to the type symbol whose members
/// should be offered.
pub fn type_symbol_for(ast: &Ast, best: NodeID, pointer_access: bool) -> Option<NodeID> {
    let node = ast.node(best);
    match &node.kind {
        NodeKind::MemberAccess { inner, pointer, .. } => {
            if let Some(symbol) = value_type_symbol(node.value_type.as_ref(), false) {
                return Some(symbol);
            }
            // unresolved trailing member: complete on the receiver
            let unwrap = *pointer || pointer_access;
            let inner_node = ast.node(*inner);
            if let Some(symbol) = value_type_symbol(inner_node.value_type.as_ref(), unwrap) {
                return Some(symbol);
            }
            // receiver named a type directly, offer its static members
            match inner_node.symbol {
                Some(symbol) if ast.is_type_symbol(symbol) => Some(symbol),
                _ => None,
            }
        }
        NodeKind::PointerIndirection { inner } => {
            value_type_symbol(node.value_type.as_ref(), false)
                .or_else(|| value_type_symbol(ast.node(*inner).value_type.as_ref(), true))
        }
        _ => {
            // a declaration under the cursor: its own type, or itself
            if node.owner_scope.is_some() {
                if ast.is_type_symbol(best) {
                    return Some(best);
                }
                if ast.is_variable_symbol(best) {
                    return value_type_symbol(node.value_type.as_ref(), pointer_access);
                }
            }
            // a reference to a type symbol completes statically
            if let Some(symbol) = node.symbol {
                if ast.is_type_symbol(symbol) {
                    return Some(symbol);
                }
            }
            value_type_symbol(node.value_type.as_ref(), pointer_access)
        }
    }
}

fn value_type_symbol(ty: Option<&DataType>, unwrap_pointer: bool) -> Option<NodeID> {
    let mut ty = ty?;
    if unwrap_pointer {
        if let DataType::Pointer(pointee) = ty {
            ty = &**pointee;
        }
    }
    ty.type_symbol()
}

/// Projects the members of a container symbol into completion items,
/// grouped the way each container kind presents them.
pub fn member_completions(ast: &Ast, container: NodeID) -> Vec<lsp::CompletionItem> {
    let mut items: Vec<lsp::CompletionItem> = Vec::new();
    let Some(members) = ast.members(container) else {
        return items;
    };

    match ast.node(container).kind {
        NodeKind::Class { .. } | NodeKind::Interface { .. } => {
            push_kind(ast, &mut items, members, is_method, lsp::CompletionItemKind::METHOD);
            push_kind(ast, &mut items, members, is_signal, lsp::CompletionItemKind::METHOD);
            push_kind(ast, &mut items, members, is_property, lsp::CompletionItemKind::PROPERTY);
            push_kind(ast, &mut items, members, is_constant, lsp::CompletionItemKind::VALUE);
            push_kind(ast, &mut items, members, is_field, lsp::CompletionItemKind::FIELD);
            push_kind(ast, &mut items, members, is_class_like, lsp::CompletionItemKind::CLASS);
            push_kind(ast, &mut items, members, is_enum, lsp::CompletionItemKind::ENUM);
            push_kind(ast, &mut items, members, is_delegate, lsp::CompletionItemKind::CLASS);
        }
        NodeKind::Enum { .. } => {
            push_kind(ast, &mut items, members, is_enum_value, lsp::CompletionItemKind::VALUE);
            push_kind(ast, &mut items, members, is_method, lsp::CompletionItemKind::METHOD);
            push_kind(ast, &mut items, members, is_constant, lsp::CompletionItemKind::FIELD);
        }
        NodeKind::ErrorDomain { .. } => {
            push_kind(ast, &mut items, members, is_error_code, lsp::CompletionItemKind::VALUE);
        }
        NodeKind::Struct { .. } => {
            push_kind(ast, &mut items, members, is_constant, lsp::CompletionItemKind::VALUE);
            push_kind(ast, &mut items, members, is_field, lsp::CompletionItemKind::FIELD);
            push_kind(ast, &mut items, members, is_method, lsp::CompletionItemKind::METHOD);
            push_kind(ast, &mut items, members, is_property, lsp::CompletionItemKind::PROPERTY);
        }
        // delegates and namespaces offer nothing
        _ => {}
    }
    items
}

fn push_kind(
    ast: &Ast,
    items: &mut Vec<lsp::CompletionItem>,
    members: &[NodeID],
    filter: fn(&NodeKind) -> bool,
    kind: lsp::CompletionItemKind,
) {
    for &member in members {
        if filter(&ast.node(member).kind) {
            push_item(ast, items, member, kind);
        }
    }
}

fn push_item(
    ast: &Ast,
    items: &mut Vec<lsp::CompletionItem>,
    member: NodeID,
    kind: lsp::CompletionItemKind,
) {
    let Some(name) = ast.symbol_name(member) else {
        return;
    };
    if items.iter().any(|item| item.label == name) {
        return;
    }
    items.push(lsp::CompletionItem {
        label: name.to_string(),
        kind: Some(kind),
        ..Default::default()
    });
}

fn is_method(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Method { name, .. } if name != ".new")
}
fn is_signal(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Signal { .. })
}
fn is_property(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Property { .. })
}
fn is_constant(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Constant { .. })
}
fn is_field(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Field { .. })
}
fn is_class_like(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Class { .. } | NodeKind::Struct { .. })
}
fn is_enum(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Enum { .. })
}
fn is_delegate(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Delegate { .. })
}
fn is_enum_value(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::EnumValue { .. })
}
fn is_error_code(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::ErrorCode { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_trigger_retargets_one_left() {
        let (trigger, adjusted) = classify_trigger("f.", 2).unwrap();
        assert!(trigger == Trigger::Member);
        assert_eq!(adjusted, 1);
    }

    #[test]
    fn arrow_trigger_retargets_two_left() {
        let (trigger, adjusted) = classify_trigger("p->", 3).unwrap();
        assert!(trigger == Trigger::PointerMember);
        assert_eq!(adjusted, 1);
    }

    #[test]
    fn bare_gt_is_not_an_access() {
        assert!(classify_trigger("a > b>", 6).is_none());
        assert!(classify_trigger("x", 1).is_none());
        assert!(classify_trigger("", 0).is_none());
    }
}
