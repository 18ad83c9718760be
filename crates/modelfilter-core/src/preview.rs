use crate::query::QueryNode;

const INDENT: &str = "  ";

/// Human-readable rendering of a query tree, one condition per line.
pub fn render(node: &QueryNode) -> String {
    let mut out = String::new();
    render_into(node, 0, &mut out);
    out
}

fn render_into(node: &QueryNode, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    match node {
        QueryNode::Leaf(c) => {
            out.push_str(&format!(
                "{pad}{}.{} {} \"{}\"",
                c.category, c.field, c.operator, c.value
            ));
        }
        QueryNode::Group { children, .. } if children.is_empty() => {
            out.push_str(&pad);
            out.push_str("[No conditions]");
        }
        QueryNode::Group { logic, children } => {
            out.push_str(&pad);
            out.push_str("(\n");
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                    out.push_str(&pad);
                    out.push_str(logic.as_str());
                    out.push('\n');
                }
                render_into(child, depth + 1, out);
            }
            out.push('\n');
            out.push_str(&pad);
            out.push(')');
        }
        QueryNode::Invalid { .. } => {
            out.push_str(&pad);
            out.push_str("[Invalid condition structure]");
        }
    }
}
