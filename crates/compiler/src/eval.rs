//! Tree-walking evaluator.
//!
//! Used by the macro engine to run macro bodies (and, optionally, by the
//! REPL's `--macros` mode instead of the compiler/VM pipeline). The real
//! execution path for ordinary programs is the bytecode VM, not this file.

use std::collections::HashMap;
use std::rc::Rc;

use mutant_core::ast::{self, Expression, Node, Program, Statement};
use mutant_core::token::{Token, TokenKind};
use mutant_core::value::{Environment, HashPair, Value};

pub fn eval_program(program: &Program, env: &Environment) -> Value {
    let mut result = Value::Null;
    for stmt in program {
        result = eval_statement(stmt, env);
        match result {
            Value::ReturnValue(v) => return *v,
            Value::Error(_) => return result,
            _ => {}
        }
    }
    result
}

fn eval_block_statement(statements: &[Statement], env: &Environment) -> Value {
    let mut result = Value::Null;
    for stmt in statements {
        result = eval_statement(stmt, env);
        if matches!(result, Value::ReturnValue(_) | Value::Error(_)) {
            return result;
        }
    }
    result
}

pub(crate) fn eval_statement(stmt: &Statement, env: &Environment) -> Value {
    match stmt {
        Statement::Expression { value, .. } => eval_expression(value, env),
        Statement::Return { value, .. } => {
            let evaluated = eval_expression(value, env);
            if matches!(evaluated, Value::Error(_)) {
                return evaluated;
            }
            Value::ReturnValue(Box::new(evaluated))
        }
        Statement::Let { name, value, .. } => {
            let evaluated = eval_expression(value, env);
            if matches!(evaluated, Value::Error(_)) {
                return evaluated;
            }
            env.set(name.clone(), evaluated);
            Value::Null
        }
        Statement::Block { statements, .. } => eval_block_statement(statements, env),
    }
}

pub fn eval_expression(expr: &Expression, env: &Environment) -> Value {
    match expr {
        Expression::IntegerLiteral { value, .. } => Value::Integer(*value),
        Expression::StringLiteral { value, .. } => Value::String(Rc::from(value.as_str())),
        Expression::BooleanLiteral { value, .. } => Value::Boolean(*value),
        Expression::Identifier { name, .. } => eval_identifier(name, env),
        Expression::Prefix { operator, right, .. } => {
            let right = eval_expression(right, env);
            if matches!(right, Value::Error(_)) {
                return right;
            }
            eval_prefix_expression(operator, &right)
        }
        Expression::Infix {
            operator,
            left,
            right,
            ..
        } => {
            let left = eval_expression(left, env);
            if matches!(left, Value::Error(_)) {
                return left;
            }
            let right = eval_expression(right, env);
            if matches!(right, Value::Error(_)) {
                return right;
            }
            eval_infix_expression(operator, &left, &right)
        }
        Expression::If {
            condition,
            consequence,
            alternative,
            ..
        } => {
            let cond = eval_expression(condition, env);
            if matches!(cond, Value::Error(_)) {
                return cond;
            }
            if cond.is_truthy() {
                eval_statement(consequence, env)
            } else if let Some(alt) = alternative {
                eval_statement(alt, env)
            } else {
                Value::Null
            }
        }
        Expression::FunctionLiteral(lit) => Value::Function {
            parameters: Rc::new(lit.parameters.clone()),
            body: Rc::new(Node::Statement((*lit.body).clone())),
            env: env.clone(),
        },
        Expression::Call {
            function,
            arguments,
            ..
        } => {
            if let Expression::Identifier { name, .. } = function.as_ref() {
                if name == "quote" && arguments.len() == 1 {
                    return quote(&arguments[0], env);
                }
            }

            let func = eval_expression(function, env);
            if matches!(func, Value::Error(_)) {
                return func;
            }
            let args = match eval_expressions(arguments, env) {
                Ok(args) => args,
                Err(e) => return e,
            };
            apply_function(&func, &args)
        }
        Expression::ArrayLiteral { elements, .. } => match eval_expressions(elements, env) {
            Ok(values) => Value::Array(Rc::new(values)),
            Err(e) => e,
        },
        Expression::HashLiteral { pairs, .. } => eval_hash_literal(pairs, env),
        Expression::Index { left, index, .. } => {
            let left = eval_expression(left, env);
            if matches!(left, Value::Error(_)) {
                return left;
            }
            let index = eval_expression(index, env);
            if matches!(index, Value::Error(_)) {
                return index;
            }
            eval_index_expression(&left, &index)
        }
        Expression::MacroLiteral(_) => {
            Value::Error("macro literal encountered outside macro definition pass".to_string())
        }
    }
}

fn eval_expressions(exprs: &[Expression], env: &Environment) -> Result<Vec<Value>, Value> {
    let mut values = Vec::with_capacity(exprs.len());
    for e in exprs {
        let v = eval_expression(e, env);
        if let Value::Error(_) = v {
            return Err(v);
        }
        values.push(v);
    }
    Ok(values)
}

fn eval_identifier(name: &str, env: &Environment) -> Value {
    if let Some(v) = env.get(name) {
        return v;
    }
    if let Some(idx) = mutant_core::builtins::NAMES.iter().position(|n| *n == name) {
        return Value::Builtin(mutant_core::builtins::FUNCTIONS[idx]);
    }
    Value::Error(format!("identifier not found: {}", name))
}

fn eval_prefix_expression(operator: &str, right: &Value) -> Value {
    match operator {
        "!" => Value::Boolean(!right.is_truthy()),
        "-" => match right {
            Value::Integer(i) => Value::Integer(-i),
            other => Value::Error(format!("unknown operator: -{}", other.type_name())),
        },
        other => Value::Error(format!("unknown operator: {}", other)),
    }
}

fn eval_infix_expression(operator: &str, left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => eval_integer_infix(operator, *a, *b),
        (Value::String(a), Value::String(b)) if operator == "+" => {
            Value::String(Rc::from(format!("{}{}", a, b)))
        }
        (Value::String(_), Value::String(_)) => Value::Error(format!(
            "unknown operator: STRING {} STRING",
            operator
        )),
        _ if operator == "==" => Value::Boolean(left == right),
        _ if operator == "!=" => Value::Boolean(left != right),
        (a, b) if a.type_name() != b.type_name() => Value::Error(format!(
            "type mismatch: {} {} {}",
            a.type_name(),
            operator,
            b.type_name()
        )),
        (a, b) => Value::Error(format!(
            "unknown operator: {} {} {}",
            a.type_name(),
            operator,
            b.type_name()
        )),
    }
}

fn eval_integer_infix(operator: &str, a: i64, b: i64) -> Value {
    match operator {
        "+" => Value::Integer(a + b),
        "-" => Value::Integer(a - b),
        "*" => Value::Integer(a * b),
        "/" => {
            if b == 0 {
                Value::Error("division by zero".to_string())
            } else {
                Value::Integer(a / b)
            }
        }
        "<" => Value::Boolean(a < b),
        ">" => Value::Boolean(a > b),
        "==" => Value::Boolean(a == b),
        "!=" => Value::Boolean(a != b),
        other => Value::Error(format!("unknown operator: INTEGER {} INTEGER", other)),
    }
}

fn eval_hash_literal(pairs: &[(Expression, Expression)], env: &Environment) -> Value {
    let mut map = HashMap::new();
    for (k, v) in pairs {
        let key = eval_expression(k, env);
        if let Value::Error(_) = key {
            return key;
        }
        let value = eval_expression(v, env);
        if let Value::Error(_) = value {
            return value;
        }
        let hash_key = match key.hash_key() {
            Ok(hk) => hk,
            Err(e) => return Value::Error(e.to_string()),
        };
        map.insert(hash_key, HashPair { key, value });
    }
    Value::Hash(Rc::new(map))
}

fn eval_index_expression(left: &Value, index: &Value) -> Value {
    match (left, index) {
        (Value::Array(elems), Value::Integer(i)) => {
            if *i < 0 || *i as usize >= elems.len() {
                Value::Null
            } else {
                elems[*i as usize].clone()
            }
        }
        (Value::Hash(map), key) => match key.hash_key() {
            Ok(hk) => map.get(&hk).map(|p| p.value.clone()).unwrap_or(Value::Null),
            Err(e) => Value::Error(e.to_string()),
        },
        (other, _) => Value::Error(format!("index operator not supported: {}", other.type_name())),
    }
}

fn apply_function(func: &Value, args: &[Value]) -> Value {
    match func {
        Value::Function {
            parameters,
            body,
            env,
        } => {
            let extended = extend_function_env(parameters.as_slice(), args, env);
            let Node::Statement(body) = body.as_ref() else {
                return Value::Error("function body must be a block statement".to_string());
            };
            let evaluated = eval_statement(body, &extended);
            unwrap_return_value(evaluated)
        }
        Value::Builtin(f) => f(args),
        other => Value::Error(format!("not a function: {}", other.type_name())),
    }
}

fn extend_function_env(parameters: &[String], args: &[Value], outer: &Environment) -> Environment {
    let env = Environment::enclosed(outer);
    for (param, arg) in parameters.iter().zip(args) {
        env.set(param.clone(), arg.clone());
    }
    env
}

fn unwrap_return_value(value: Value) -> Value {
    match value {
        Value::ReturnValue(v) => *v,
        other => other,
    }
}

/// `quote(e)` packages `e` unevaluated, except that any `unquote(x)` call
/// nested inside it is replaced by `x` evaluated in the calling
/// environment and converted back into an AST literal.
fn quote(expr: &Expression, env: &Environment) -> Value {
    let modified = ast::modify_expr(expr.clone(), &mut |node| eval_unquote_calls(node, env));
    Value::Quote(Rc::new(Node::Expression(modified)))
}

fn eval_unquote_calls(node: Node, env: &Environment) -> Node {
    let Node::Expression(Expression::Call {
        function,
        arguments,
        ..
    }) = &node
    else {
        return node;
    };

    let Expression::Identifier { name, .. } = function.as_ref() else {
        return node;
    };

    if name != "unquote" || arguments.len() != 1 {
        return node;
    }

    let evaluated = eval_expression(&arguments[0], env);
    Node::Expression(value_to_ast_expression(evaluated))
}

/// Converts a runtime value produced by `unquote` back into a literal AST
/// node. Only the handful of value kinds representable as a literal make
/// sense here; anything else is a programming error in the macro, not a
/// value the language can otherwise express.
fn value_to_ast_expression(value: Value) -> Expression {
    match value {
        Value::Integer(i) => Expression::IntegerLiteral {
            token: Token::new(TokenKind::Int, i.to_string()),
            value: i,
        },
        Value::Boolean(b) => Expression::BooleanLiteral {
            token: Token::new(if b { TokenKind::True } else { TokenKind::False }, b.to_string()),
            value: b,
        },
        Value::String(s) => Expression::StringLiteral {
            token: Token::new(TokenKind::String, s.to_string()),
            value: s.to_string(),
        },
        Value::Quote(node) => match node.as_ref() {
            Node::Expression(e) => e.clone(),
            Node::Statement(_) => panic!("cannot unquote a statement into an expression position"),
        },
        other => panic!(
            "cannot convert {} into an AST node for unquote",
            other.type_name()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mutant_core::lexer::Lexer;

    use crate::parser::Parser;

    fn eval(input: &str) -> Value {
        let mut parser = Parser::new(Lexer::new(input));
        let program = parser.parse_program();
        assert!(parser.errors().is_empty(), "{:?}", parser.errors());
        eval_program(&program, &Environment::new())
    }

    #[test]
    fn integer_arithmetic() {
        assert_eq!(eval("5 + 5 * 2 - 10 / 2"), Value::Integer(15));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(eval(r#""mon" + "key""#), Value::String(Rc::from("monkey")));
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        let input = "let newAdder = fn(x) { fn(y) { x + y } }; let addTwo = newAdder(2); addTwo(3);";
        assert_eq!(eval(input), Value::Integer(5));
    }

    #[test]
    fn builtin_len_reports_errors_as_values() {
        assert_eq!(
            eval(r#"len(1)"#),
            Value::Error("argument to `len` not supported, got INTEGER".to_string())
        );
    }

    #[test]
    fn quote_unquote_splices_evaluated_integer() {
        let result = eval("quote(4 + unquote(2 + 2))");
        let Value::Quote(node) = result else {
            panic!("expected a Quote value");
        };
        let Node::Expression(Expression::Infix { left, right, .. }) = node.as_ref() else {
            panic!("expected an infix expression inside the quote");
        };
        assert!(matches!(**left, Expression::IntegerLiteral { value: 4, .. }));
        assert!(matches!(**right, Expression::IntegerLiteral { value: 4, .. }));
    }

    #[test]
    fn recursive_self_reference_through_let_binding() {
        let input =
            "let fact = fn(n) { if (n == 0) { 1 } else { n * fact(n - 1) } }; fact(5);";
        assert_eq!(eval(input), Value::Integer(120));
    }
}
