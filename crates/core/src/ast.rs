//! Abstract syntax tree produced by the parser.
//!
//! Every node keeps its originating [`Token`] so later passes (parser error
//! messages, macro expansion) have something to point at, even though the
//! language has no source-level debugger (see Non-goals).

use crate::token::Token;

pub type Program = Vec<Statement>;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Let {
        token: Token,
        name: String,
        value: Expression,
    },
    Return {
        token: Token,
        value: Expression,
    },
    Expression {
        token: Token,
        value: Expression,
    },
    Block {
        token: Token,
        statements: Vec<Statement>,
    },
}

impl Statement {
    pub fn token_literal(&self) -> &str {
        match self {
            Statement::Let { token, .. }
            | Statement::Return { token, .. }
            | Statement::Expression { token, .. }
            | Statement::Block { token, .. } => &token.literal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    pub token: Token,
    pub parameters: Vec<String>,
    pub body: Box<Statement>,
    /// Populated by the parser when this literal is the right-hand side of
    /// `let name = fn(...) {...}`, so the compiler/evaluator can resolve
    /// self-recursive calls by name.
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroLiteral {
    pub token: Token,
    pub parameters: Vec<String>,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier {
        token: Token,
        name: String,
    },
    IntegerLiteral {
        token: Token,
        value: i64,
    },
    StringLiteral {
        token: Token,
        value: String,
    },
    BooleanLiteral {
        token: Token,
        value: bool,
    },
    Prefix {
        token: Token,
        operator: String,
        right: Box<Expression>,
    },
    Infix {
        token: Token,
        left: Box<Expression>,
        operator: String,
        right: Box<Expression>,
    },
    If {
        token: Token,
        condition: Box<Expression>,
        consequence: Box<Statement>,
        alternative: Option<Box<Statement>>,
    },
    FunctionLiteral(FunctionLiteral),
    Call {
        token: Token,
        function: Box<Expression>,
        arguments: Vec<Expression>,
    },
    ArrayLiteral {
        token: Token,
        elements: Vec<Expression>,
    },
    HashLiteral {
        token: Token,
        pairs: Vec<(Expression, Expression)>,
    },
    Index {
        token: Token,
        left: Box<Expression>,
        index: Box<Expression>,
    },
    MacroLiteral(MacroLiteral),
}

impl Expression {
    pub fn token(&self) -> &Token {
        match self {
            Expression::Identifier { token, .. }
            | Expression::IntegerLiteral { token, .. }
            | Expression::StringLiteral { token, .. }
            | Expression::BooleanLiteral { token, .. }
            | Expression::Prefix { token, .. }
            | Expression::Infix { token, .. }
            | Expression::If { token, .. }
            | Expression::Call { token, .. }
            | Expression::ArrayLiteral { token, .. }
            | Expression::HashLiteral { token, .. }
            | Expression::Index { token, .. } => token,
            Expression::FunctionLiteral(lit) => &lit.token,
            Expression::MacroLiteral(lit) => &lit.token,
        }
    }
}

/// A bottom-up tree rewrite, mirroring the classic `Modify` visitor: the
/// modifier runs on every child before it runs on the node itself.
pub fn modify_expr(expr: Expression, modifier: &mut dyn FnMut(Node) -> Node) -> Expression {
    let expr = match expr {
        Expression::Infix {
            token,
            left,
            operator,
            right,
        } => Expression::Infix {
            token,
            left: Box::new(modify_expr(*left, modifier)),
            operator,
            right: Box::new(modify_expr(*right, modifier)),
        },
        Expression::Prefix {
            token,
            operator,
            right,
        } => Expression::Prefix {
            token,
            operator,
            right: Box::new(modify_expr(*right, modifier)),
        },
        Expression::Index { token, left, index } => Expression::Index {
            token,
            left: Box::new(modify_expr(*left, modifier)),
            index: Box::new(modify_expr(*index, modifier)),
        },
        Expression::If {
            token,
            condition,
            consequence,
            alternative,
        } => Expression::If {
            token,
            condition: Box::new(modify_expr(*condition, modifier)),
            consequence: Box::new(modify_stmt(*consequence, modifier)),
            alternative: alternative.map(|alt| Box::new(modify_stmt(*alt, modifier))),
        },
        Expression::FunctionLiteral(FunctionLiteral {
            token,
            parameters,
            body,
            name,
        }) => Expression::FunctionLiteral(FunctionLiteral {
            token,
            parameters,
            body: Box::new(modify_stmt(*body, modifier)),
            name,
        }),
        Expression::ArrayLiteral { token, elements } => Expression::ArrayLiteral {
            token,
            elements: elements
                .into_iter()
                .map(|e| modify_expr(e, modifier))
                .collect(),
        },
        Expression::HashLiteral { token, pairs } => Expression::HashLiteral {
            token,
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (modify_expr(k, modifier), modify_expr(v, modifier)))
                .collect(),
        },
        Expression::Call {
            token,
            function,
            arguments,
        } => Expression::Call {
            token,
            function: Box::new(modify_expr(*function, modifier)),
            arguments: arguments
                .into_iter()
                .map(|a| modify_expr(a, modifier))
                .collect(),
        },
        other => other,
    };

    match modifier(Node::Expression(expr)) {
        Node::Expression(e) => e,
        _ => unreachable!("modifier must return the same node kind it was given"),
    }
}

pub fn modify_stmt(stmt: Statement, modifier: &mut dyn FnMut(Node) -> Node) -> Statement {
    let stmt = match stmt {
        Statement::Let { token, name, value } => Statement::Let {
            token,
            name,
            value: modify_expr(value, modifier),
        },
        Statement::Return { token, value } => Statement::Return {
            token,
            value: modify_expr(value, modifier),
        },
        Statement::Expression { token, value } => Statement::Expression {
            token,
            value: modify_expr(value, modifier),
        },
        Statement::Block { token, statements } => Statement::Block {
            token,
            statements: statements
                .into_iter()
                .map(|s| modify_stmt(s, modifier))
                .collect(),
        },
    };

    match modifier(Node::Statement(stmt)) {
        Node::Statement(s) => s,
        _ => unreachable!("modifier must return the same node kind it was given"),
    }
}

pub fn modify_program(program: Program, modifier: &mut dyn FnMut(Node) -> Node) -> Program {
    program
        .into_iter()
        .map(|s| modify_stmt(s, modifier))
        .collect()
}

/// Either half of the AST, passed to a [`modify_expr`]/[`modify_stmt`]
/// visitor. The visitor must return the same variant it was given.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Statement(Statement),
    Expression(Expression),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn int(n: i64) -> Expression {
        Expression::IntegerLiteral {
            token: Token::new(TokenKind::Int, n.to_string()),
            value: n,
        }
    }

    #[test]
    fn modify_rewrites_every_integer_literal() {
        let one = || int(1);
        let two = || int(2);
        let turn_one_into_two = |node: Node| -> Node {
            match node {
                Node::Expression(Expression::IntegerLiteral { value: 1, token }) => {
                    Node::Expression(Expression::IntegerLiteral { token, value: 2 })
                }
                other => other,
            }
        };

        let mut modifier = turn_one_into_two;

        assert_eq!(modify_expr(one(), &mut modifier), two());

        let infix = Expression::Infix {
            token: Token::new(TokenKind::Plus, "+"),
            left: Box::new(one()),
            operator: "+".to_string(),
            right: Box::new(one()),
        };
        let expected = Expression::Infix {
            token: Token::new(TokenKind::Plus, "+"),
            left: Box::new(two()),
            operator: "+".to_string(),
            right: Box::new(two()),
        };
        assert_eq!(modify_expr(infix, &mut modifier), expected);
    }

    #[test]
    fn modify_is_identity_under_a_passthrough_modifier() {
        let mut identity = |node: Node| node;
        let array = Expression::ArrayLiteral {
            token: Token::new(TokenKind::LBracket, "["),
            elements: vec![int(1), int(2), int(3)],
        };
        let again = array.clone();
        assert_eq!(modify_expr(array, &mut identity), again);
    }
}
