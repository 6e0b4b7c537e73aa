/// The capability set the matcher requires from a constituency-tree node.
///
/// Trees are consumed, never constructed: an implementor owns its arena and
/// hands out cheap, clonable handles. Equality is identity — two handles
/// compare equal iff they denote the same node.
pub trait Tree: Clone + PartialEq {
    type Children<'a>: Iterator<Item = Self>
    where
        Self: 'a;

    /// The node's surface label, or `None` for nodes without one.
    fn label(&self) -> Option<&str>;

    /// The label up to (not including) the first `-`, `=`, or `#`.
    ///
    /// `None` iff `label()` is `None`.
    fn basic_category(&self) -> Option<&str>;

    fn parent(&self) -> Option<Self>;

    fn children(&self) -> Self::Children<'_>;

    /// The terminal (leaf) that heads this node's phrase, per an external
    /// head-finding table. `None` when the node itself is a leaf or when
    /// head information isn't available.
    fn head_terminal(&self) -> Option<Self>;

    /// This node's immediate head child, per an external head-finding table.
    fn head_child(&self) -> Option<Self>;

    fn is_leaf(&self) -> bool {
        self.children().next().is_none()
    }

    fn preorder_iter(&self) -> Preorder<Self>
    where
        Self: Sized,
    {
        Preorder::new(self.clone())
    }
}

/// Lazy left-to-right preorder walk, self first.
///
/// Built from an explicit stack rather than borrowing a cursor, since `Tree`
/// exposes no cursor of its own.
pub struct Preorder<T: Tree> {
    stack: Vec<T>,
}

impl<T: Tree> Preorder<T> {
    pub fn new(root: T) -> Self {
        Self { stack: vec![root] }
    }
}

impl<T: Tree> Iterator for Preorder<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let node = self.stack.pop()?;
        let mut kids: Vec<T> = node.children().collect();
        kids.reverse();
        self.stack.extend(kids);
        Some(node)
    }
}

#[cfg(test)]
pub(crate) mod test_tree {
    use super::Tree;
    use std::rc::Rc;

    /// Minimal bracket-notation tree used across the crate's tests:
    /// `(label child child ...)`, leaves are bare tokens.
    #[derive(Debug)]
    struct Node {
        label: Option<String>,
        parent: std::cell::RefCell<Option<std::rc::Weak<Node>>>,
        children: std::cell::RefCell<Vec<Rc<Node>>>,
    }

    #[derive(Clone)]
    pub struct TestTree(Rc<Node>);

    impl PartialEq for TestTree {
        fn eq(&self, other: &Self) -> bool {
            Rc::ptr_eq(&self.0, &other.0)
        }
    }

    impl Tree for TestTree {
        type Children<'a> = std::vec::IntoIter<TestTree>;

        fn label(&self) -> Option<&str> {
            self.0.label.as_deref()
        }

        fn basic_category(&self) -> Option<&str> {
            self.label().map(|l| {
                l.split(['-', '=', '#']).next().unwrap_or(l)
            })
        }

        fn parent(&self) -> Option<Self> {
            self.0
                .parent
                .borrow()
                .as_ref()
                .and_then(|w| w.upgrade())
                .map(TestTree)
        }

        fn children(&self) -> Self::Children<'_> {
            let v: Vec<TestTree> = self.0.children.borrow().iter().cloned().map(TestTree).collect();
            v.into_iter()
        }

        fn head_terminal(&self) -> Option<Self> {
            let mut cur = self.clone();
            while !cur.is_leaf() {
                cur = cur.head_child()?;
            }
            Some(cur)
        }

        fn head_child(&self) -> Option<Self> {
            self.children().last()
        }
    }

    /// Parses `(foo bar (rab (baz bar)))`-style bracket notation.
    pub fn parse(src: &str) -> TestTree {
        let tokens = tokenize(src);
        let mut pos = 0;
        let root = parse_node(&tokens, &mut pos);
        attach_parents(&root, None);
        TestTree(root)
    }

    fn tokenize(src: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut cur = String::new();
        for c in src.chars() {
            match c {
                '(' | ')' => {
                    if !cur.is_empty() {
                        out.push(std::mem::take(&mut cur));
                    }
                    out.push(c.to_string());
                }
                c if c.is_whitespace() => {
                    if !cur.is_empty() {
                        out.push(std::mem::take(&mut cur));
                    }
                }
                c => cur.push(c),
            }
        }
        if !cur.is_empty() {
            out.push(cur);
        }
        out
    }

    fn parse_node(tokens: &[String], pos: &mut usize) -> Rc<Node> {
        assert_eq!(tokens[*pos], "(");
        *pos += 1;
        let label = tokens[*pos].clone();
        *pos += 1;
        let mut children = Vec::new();
        loop {
            match tokens[*pos].as_str() {
                "(" => children.push(parse_node(tokens, pos)),
                ")" => {
                    *pos += 1;
                    break;
                }
                leaf => {
                    children.push(Rc::new(Node {
                        label: Some(leaf.to_string()),
                        parent: std::cell::RefCell::new(None),
                        children: std::cell::RefCell::new(Vec::new()),
                    }));
                    *pos += 1;
                }
            }
        }
        Rc::new(Node {
            label: Some(label),
            parent: std::cell::RefCell::new(None),
            children: std::cell::RefCell::new(children),
        })
    }

    fn attach_parents(node: &Rc<Node>, parent: Option<&Rc<Node>>) {
        if let Some(p) = parent {
            *node.parent.borrow_mut() = Some(Rc::downgrade(p));
        }
        for c in node.children.borrow().iter() {
            attach_parents(c, Some(node));
        }
    }

    #[test]
    fn preorder_visits_self_first_left_to_right() {
        let t = parse("(foo bar (rab (baz bar)))");
        let labels: Vec<_> = t.preorder_iter().map(|n| n.label().unwrap().to_string()).collect();
        assert_eq!(labels, vec!["foo", "bar", "rab", "baz", "bar"]);
    }

    #[test]
    fn basic_category_strips_suffix() {
        let t = parse("(NP-SBJ=3 foo)");
        assert_eq!(t.basic_category(), Some("NP"));
    }
}
