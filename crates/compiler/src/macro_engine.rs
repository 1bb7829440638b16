//! Macro hoisting and expansion.
//!
//! Runs between parsing and compilation: `define_macros` pulls every
//! `let name = macro(...){...}` binding out of the program into a macro
//! environment, then `expand_macros` rewrites every remaining call to a
//! bound macro name into the AST its body produces.

use std::rc::Rc;

use mutant_core::ast::{self, Expression, Node, Program, Statement};
use mutant_core::value::{Environment, Value};

use crate::eval;

pub fn define_macros(program: Program, macro_env: &Environment) -> Program {
    program
        .into_iter()
        .filter(|stmt| !try_register_macro(stmt, macro_env))
        .collect()
}

fn try_register_macro(stmt: &Statement, macro_env: &Environment) -> bool {
    let Statement::Let {
        name,
        value: Expression::MacroLiteral(lit),
        ..
    } = stmt
    else {
        return false;
    };

    let value = Value::Macro {
        parameters: Rc::new(lit.parameters.clone()),
        body: Rc::new(Node::Statement((*lit.body).clone())),
        env: macro_env.clone(),
    };
    macro_env.set(name.clone(), value);
    true
}

pub fn expand_macros(program: Program, macro_env: &Environment) -> Program {
    ast::modify_program(program, &mut |node| expand_node(node, macro_env))
}

fn expand_node(node: Node, macro_env: &Environment) -> Node {
    let Node::Expression(Expression::Call {
        token,
        function,
        arguments,
    }) = node
    else {
        return node;
    };

    let Expression::Identifier { name, .. } = function.as_ref() else {
        return Node::Expression(Expression::Call {
            token,
            function,
            arguments,
        });
    };

    let Some(Value::Macro {
        parameters,
        body,
        env,
    }) = macro_env.get(name)
    else {
        return Node::Expression(Expression::Call {
            token,
            function,
            arguments,
        });
    };

    let eval_env = Environment::enclosed(&env);
    for (param, arg) in parameters.iter().zip(arguments.iter()) {
        let quoted = Value::Quote(Rc::new(Node::Expression(arg.clone())));
        eval_env.set(param.clone(), quoted);
    }

    let Node::Statement(body_stmt) = body.as_ref() else {
        panic!("macro body must be a block statement");
    };

    match eval::eval_statement(body_stmt, &eval_env) {
        Value::Quote(quoted_node) => (*quoted_node).clone(),
        other => panic!(
            "macro {} did not return a quoted expression, got {}",
            name,
            other.type_name()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mutant_core::lexer::Lexer;

    use crate::parser::Parser;

    fn parse(input: &str) -> Program {
        let mut parser = Parser::new(Lexer::new(input));
        let program = parser.parse_program();
        assert!(parser.errors().is_empty(), "{:?}", parser.errors());
        program
    }

    #[test]
    fn define_macros_removes_macro_bindings_from_the_program() {
        let program = parse("let number = 1; let function = macro(x, y) { x + y; };");
        let macro_env = Environment::new();
        let remaining = define_macros(program, &macro_env);
        assert_eq!(remaining.len(), 1);
        assert!(macro_env.get("function").is_some());
    }

    #[test]
    fn unless_macro_rewrites_to_inverted_if() {
        let program = parse(
            r#"
            let unless = macro(c, a, b) {
                quote(if (!(unquote(c))) { unquote(a) } else { unquote(b) });
            };
            unless(10 > 5, "not greater", "greater");
            "#,
        );
        let macro_env = Environment::new();
        let program = define_macros(program, &macro_env);
        let expanded = expand_macros(program, &macro_env);

        let Statement::Expression {
            value: Expression::If { .. },
            ..
        } = &expanded[0]
        else {
            panic!("expected the call to expand into an if-expression");
        };
    }
}
