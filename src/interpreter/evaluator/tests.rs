use super::*;
use crate::interpreter::host::{BufferSink, FillRect, RecordingSurface};
use crate::interpreter::lexer::tokenize;
use crate::interpreter::parser::parse;

struct Outcome {
    result: EvalResult<Value>,
    environment: Environment,
    output: BufferSink,
    surface: RecordingSurface,
    loop_passes: usize,
}

fn run_with_depth(source: &str, max_call_depth: usize) -> Outcome {
    let program: Rc<[Node]> = parse(&tokenize(source).unwrap()).unwrap().into();
    let output = BufferSink::with_streams(&["out"]);
    let surface = RecordingSurface::new();
    let mut host = Host::new(output.clone(), surface.clone());

    let mut evaluator = Evaluator::new(program, Environment::new_global(), max_call_depth);
    let mut loop_passes = 0;

    let result = loop {
        match evaluator.run(&mut host) {
            Ok(Step::LoopPass) => loop_passes += 1,
            Ok(Step::Done(value)) => break Ok(value),
            Err(err) => break Err(err),
        }
    };

    Outcome { result, environment: evaluator.into_environment(), output, surface, loop_passes }
}

fn run(source: &str) -> Outcome {
    run_with_depth(source, DEFAULT_MAX_CALL_DEPTH)
}

fn value_of(source: &str) -> Value {
    run(source).result.unwrap()
}

fn error_of(source: &str) -> EvalError {
    run(source).result.unwrap_err()
}

fn numbers(values: &[f64]) -> Value {
    Value::list(values.iter().map(|value| Value::Number(*value)).collect())
}

mod arithmetic {
    use super::*;

    #[test]
    pub fn test_variadic_folds() {
        assert_eq!(value_of("(+ 1 2 3)"), Value::Number(6.0));
        assert_eq!(value_of("(* 2 3 4)"), Value::Number(24.0));
        assert_eq!(value_of("(- 10 1 2)"), Value::Number(7.0));
        assert_eq!(value_of("(/ 24 2 3)"), Value::Number(4.0));
        assert_eq!(value_of("(+)"), Value::Number(0.0));
        assert_eq!(value_of("(*)"), Value::Number(1.0));
    }

    #[test]
    pub fn test_unary_minus_and_reciprocal() {
        assert_eq!(value_of("(- 5)"), Value::Number(-5.0));
        assert_eq!(value_of("(/ 4)"), Value::Number(0.25));
    }

    #[test]
    pub fn test_remainder_and_modulo() {
        assert_eq!(value_of("(% 7 3)"), Value::Number(1.0));
        assert_eq!(value_of("(% -7 3)"), Value::Number(-1.0));
        assert_eq!(value_of("(mod -7 3)"), Value::Number(2.0));
        assert_eq!(value_of("(mod 7 -3)"), Value::Number(-2.0));
    }

    #[test]
    pub fn test_division_follows_floating_point() {
        assert_eq!(value_of("(/ 1 0)"), Value::Number(f64::INFINITY));
    }

    #[test]
    pub fn test_plus_concatenates_text() {
        assert_eq!(value_of("(+ \"n=\" 4)"), Value::text("n=4"));
    }

    #[test]
    pub fn test_missing_operands() {
        assert_eq!(error_of("(-)"), EvalError::ArityMismatch {
            operation: String::from("-"), expected: String::from("at least 1"), got: 0,
        });
        assert_eq!(error_of("(< 1)"), EvalError::ArityMismatch {
            operation: String::from("<"), expected: String::from("2"), got: 1,
        });
    }
}

mod logic {
    use super::*;

    #[test]
    pub fn test_comparisons() {
        assert_eq!(value_of("(< 1 2)"), Value::Boolean(true));
        assert_eq!(value_of("(>= 2 2)"), Value::Boolean(true));
        assert_eq!(value_of("(> \"b\" \"a\")"), Value::Boolean(true));
        assert_eq!(value_of("(== 1 \"1\")"), Value::Boolean(true));
        assert_eq!(value_of("(!= 1 2)"), Value::Boolean(true));
        assert_eq!(value_of("(! 0)"), Value::Boolean(true));
    }

    #[test]
    pub fn test_and_or_short_circuit() {
        assert_eq!(value_of("(or 7 (missing))"), Value::Number(7.0));
        assert_eq!(value_of("(and 0 (missing))"), Value::Number(0.0));
        assert_eq!(value_of("(and 1 \"yes\")"), Value::text("yes"));
        assert_eq!(value_of("(or 0 \"\")"), Value::text(""));
    }

    #[test]
    pub fn test_if() {
        assert_eq!(value_of("(if (< 1 2) 1 2)"), Value::Number(1.0));
        assert_eq!(value_of("(if 0 1 2)"), Value::Number(2.0));
        assert_eq!(value_of("(if 0 1 else 2)"), Value::Number(2.0));
        assert_eq!(value_of("(if \"\" 1)"), Value::Undefined);
        assert_eq!(value_of("(if nil 1 2)"), Value::Number(1.0));
    }
}

mod bindings {
    use super::*;

    #[test]
    pub fn test_def_then_set() {
        let outcome = run("(def x 10) (set x 20) x");

        assert_eq!(outcome.result, Ok(Value::Number(20.0)));
        assert_eq!(outcome.environment.lookup("x"), Some(&Value::Number(20.0)));
    }

    #[test]
    pub fn test_set_requires_existing_binding() {
        assert_eq!(error_of("(set y 5)"), EvalError::UndefinedVariable(String::from("y")));
    }

    #[test]
    pub fn test_let_var_const_bind_like_def() {
        assert_eq!(value_of("(let a 1) (var b 2) (const c 3) (+ a b c)"), Value::Number(6.0));
    }

    #[test]
    pub fn test_nil_is_empty_list() {
        assert_eq!(value_of("nil"), Value::nil());
    }

    #[test]
    pub fn test_undefined_variable() {
        assert_eq!(error_of("(+ 1 nope)"), EvalError::UndefinedVariable(String::from("nope")));
    }

    #[test]
    pub fn test_binding_to_undefined_reads_as_unbound() {
        assert_eq!(error_of("(def x (if 0 1)) x"), EvalError::UndefinedVariable(String::from("x")));
    }

    #[test]
    pub fn test_malformed_def() {
        assert_eq!(error_of("(def 1 2)"), EvalError::MalformedForm {
            form: String::from("def"), reason: "expected a name and a value",
        });
    }
}

mod functions {
    use super::*;

    #[test]
    pub fn test_call_with_return() {
        assert_eq!(value_of("(func add (a b) (return (+ a b))) (add 2 3)"), Value::Number(5.0));
    }

    #[test]
    pub fn test_body_value_without_return() {
        assert_eq!(value_of("(func twice (a) (* a 2)) (twice 4)"), Value::Number(8.0));
        assert_eq!(value_of("(func nothing ()) (nothing)"), Value::Undefined);
    }

    #[test]
    pub fn test_caller_environment_is_isolated() {
        let outcome = run("(def x 1) (func f (a) (def x 2) (set a 9) (def y 3) (return x)) (f 0)");

        assert_eq!(outcome.result, Ok(Value::Number(2.0)));
        assert_eq!(outcome.environment.lookup("x"), Some(&Value::Number(1.0)));
        assert_eq!(outcome.environment.lookup("a"), None);
        assert_eq!(outcome.environment.lookup("y"), None);
    }

    #[test]
    pub fn test_callee_sees_caller_bindings_at_call_time() {
        assert_eq!(value_of("(func f () (return z)) (def z 4) (f)"), Value::Number(4.0));
        assert_eq!(error_of("(func f () (return z)) (f) (def z 4)"), EvalError::UndefinedVariable(String::from("z")));
    }

    #[test]
    pub fn test_return_stops_remaining_body() {
        let outcome = run("(func f () (cout out 1) (return 2) (cout out 3)) (f)");

        assert_eq!(outcome.result, Ok(Value::Number(2.0)));
        assert_eq!(outcome.output.contents("out"), "1\n");
    }

    #[test]
    pub fn test_return_unwinds_through_loop_and_if() {
        let source = "(func find (limit) (def i 0) (while 1 (if (== i limit) (return (* i 10))) (set i (+ i 1)))) (find 4)";

        assert_eq!(value_of(source), Value::Number(40.0));
    }

    #[test]
    pub fn test_recursion() {
        let source = "(func fact (n) (if (<= n 1) 1 (* n (fact (- n 1))))) (fact 10)";

        assert_eq!(value_of(source), Value::Number(3628800.0));
    }

    #[test]
    pub fn test_deep_recursion_does_not_use_native_stack() {
        let source = "(func down (n) (if (== n 0) 0 (down (- n 1)))) (down 5000)";

        assert_eq!(value_of(source), Value::Number(0.0));
    }

    #[test]
    pub fn test_call_depth_limit() {
        let outcome = run_with_depth("(func loop (n) (loop (+ n 1))) (loop 0)", 50);

        assert_eq!(outcome.result, Err(EvalError::CallDepthExceeded(50)));
        assert_eq!(outcome.environment.lookup("n"), None);
    }

    #[test]
    pub fn test_surplus_arguments_are_not_evaluated() {
        assert_eq!(value_of("(func first (a) (return a)) (first 1 (missing))"), Value::Number(1.0));
    }

    #[test]
    pub fn test_missing_parameter_is_unbound() {
        assert_eq!(error_of("(func pair (a b) (return b)) (pair 1)"), EvalError::UndefinedVariable(String::from("b")));
    }

    #[test]
    pub fn test_undefined_function() {
        assert_eq!(error_of("(nope 1)"), EvalError::UndefinedFunction(String::from("nope")));
        assert_eq!(error_of("(def x 1) (x)"), EvalError::UndefinedFunction(String::from("x")));
    }

    #[test]
    pub fn test_builtins_shadow_user_functions() {
        assert_eq!(value_of("(func car (l) (return 0)) (car '(5 6))"), Value::Number(5.0));
    }
}

mod sequences {
    use super::*;

    #[test]
    pub fn test_implicit_sequence() {
        let outcome = run("((def a 1) (def b 2) (+ a b))");

        assert_eq!(outcome.result, Ok(Value::Number(3.0)));
        assert_eq!(outcome.environment.lookup("b"), Some(&Value::Number(2.0)));
    }

    #[test]
    pub fn test_implicit_sequence_catches_return() {
        let outcome = run("(def r ((cout out 1) (return 5) (cout out 2))) (cout out r)");

        assert_eq!(outcome.result, Ok(Value::Number(5.0)));
        assert_eq!(outcome.output.contents("out"), "1\n5\n");
    }

    #[test]
    pub fn test_top_level_return_stops_program() {
        let outcome = run("(def x 1) (return 7) (def x 2)");

        assert_eq!(outcome.result, Ok(Value::Number(7.0)));
        assert_eq!(outcome.environment.lookup("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    pub fn test_empty_list_is_undefined() {
        assert_eq!(value_of("()"), Value::Undefined);
    }
}

mod loops {
    use super::*;

    #[test]
    pub fn test_while_counts_to_five() {
        let outcome = run("(def i 0) (while (< i 5) (set i (+ i 1)))");

        assert_eq!(outcome.result, Ok(Value::Undefined));
        assert_eq!(outcome.environment.lookup("i"), Some(&Value::Number(5.0)));
        assert_eq!(outcome.loop_passes, 5);
    }

    #[test]
    pub fn test_loop_pass_with_empty_body() {
        let outcome = run("(def i 0) (while (< (set i (+ i 1)) 3))");

        assert_eq!(outcome.environment.lookup("i"), Some(&Value::Number(3.0)));
        assert_eq!(outcome.loop_passes, 2);
    }

    #[test]
    pub fn test_nested_loops() {
        let source = "(def total 0) (def i 0)
            (while (< i 3) (def j 0) (while (< j 4) (set total (+ total 1)) (set j (+ j 1))) (set i (+ i 1)))
            total";
        let outcome = run(source);

        assert_eq!(outcome.result, Ok(Value::Number(12.0)));
        assert_eq!(outcome.loop_passes, 15);
    }
}

mod lists {
    use super::*;

    #[test]
    pub fn test_primitives() {
        assert_eq!(value_of("(car '(1 2 3))"), Value::Number(1.0));
        assert_eq!(value_of("(cdr '(1 2 3))"), numbers(&[2.0, 3.0]));
        assert_eq!(value_of("(reverse '(1 2 3))"), numbers(&[3.0, 2.0, 1.0]));
        assert_eq!(value_of("(length '(1 2 3))"), Value::Number(3.0));
        assert_eq!(value_of("(cons 0 '(1 2))"), numbers(&[0.0, 1.0, 2.0]));
        assert_eq!(value_of("(list 1 (+ 1 1) 3)"), numbers(&[1.0, 2.0, 3.0]));
        assert_eq!(value_of("(append '(1) nil '(2 3))"), numbers(&[1.0, 2.0, 3.0]));
    }

    #[test]
    pub fn test_empty_list_edges() {
        assert_eq!(value_of("(car nil)"), Value::Undefined);
        assert_eq!(value_of("(cdr nil)"), Value::nil());
    }

    #[test]
    pub fn test_type_errors() {
        assert_eq!(error_of("(car 5)"), EvalError::WrongArgumentType {
            operation: String::from("car"), expected: "list", found: "number",
        });
        assert_eq!(error_of("(cons 1 2)"), EvalError::WrongArgumentType {
            operation: String::from("cons"), expected: "list", found: "number",
        });
        assert_eq!(error_of("(append '(1) \"x\")"), EvalError::WrongArgumentType {
            operation: String::from("append"), expected: "list", found: "text",
        });
    }

    #[test]
    pub fn test_quote() {
        assert_eq!(value_of("(quote (a 1))"), Value::list(vec![Value::text("a"), Value::Number(1.0)]));
        assert_eq!(value_of("'sym"), Value::text("sym"));
    }
}

mod switch {
    use super::*;

    #[test]
    pub fn test_matching_case() {
        assert_eq!(value_of("(switch 2 (case 1 'a) (case 2 'b) (default 'c))"), Value::text("b"));
    }

    #[test]
    pub fn test_default_and_no_match() {
        assert_eq!(value_of("(switch 9 (case 1 'a) (default 'c))"), Value::text("c"));
        assert_eq!(value_of("(switch 9 (case 1 'a))"), Value::Undefined);
    }

    #[test]
    pub fn test_string_and_quoted_keys() {
        assert_eq!(value_of("(switch \"x\" (case \"x\" 1) (default 2))"), Value::Number(1.0));
        assert_eq!(value_of("(switch (car '(y)) (case 'y 1) (default 2))"), Value::Number(1.0));
    }

    #[test]
    pub fn test_clause_body_runs_in_order() {
        let outcome = run("(switch 1 (case 1 (cout out \"a\") (cout out \"b\") 3))");

        assert_eq!(outcome.result, Ok(Value::Number(3.0)));
        assert_eq!(outcome.output.contents("out"), "a\nb\n");
    }

    #[test]
    pub fn test_return_passes_through_clause() {
        assert_eq!(value_of("(func f (x) (switch x (case 1 (return 10))) (return 20)) (f 1)"), Value::Number(10.0));
    }
}

mod effects {
    use super::*;

    #[test]
    pub fn test_cout_renders_values() {
        let outcome = run("(cout out '(1 (2 \"s\") 3)) (cout \"out\" (+ 1 1))");

        assert_eq!(outcome.result, Ok(Value::Number(2.0)));
        assert_eq!(outcome.output.contents("out"), "(1 (2 s) 3)\n2\n");
    }

    #[test]
    pub fn test_cout_failure_propagates() {
        assert_eq!(error_of("(cout missing 1)"), EvalError::Host(HostError::new("No output stream named 'missing'")));
    }

    #[test]
    pub fn test_fill_rect() {
        let outcome = run("(fillRect canvas 1 2 (+ 1 2) 4 \"red\") (fillRect canvas 0 0 1 1)");

        assert_eq!(outcome.result, Ok(Value::Undefined));
        assert_eq!(outcome.surface.operations(), vec![
            FillRect {
                surface_id: String::from("canvas"),
                rect: Rect { x: 1.0, y: 2.0, width: 3.0, height: 4.0 },
                color: Some(String::from("red")),
            },
            FillRect {
                surface_id: String::from("canvas"),
                rect: Rect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
                color: None,
            },
        ]);
    }

    #[test]
    pub fn test_fill_rect_arity() {
        assert_eq!(error_of("(fillRect canvas 1 2)"), EvalError::ArityMismatch {
            operation: String::from("fillRect"), expected: String::from("5 or 6"), got: 3,
        });
    }
}

mod single_form {
    use super::*;

    #[test]
    pub fn test_evaluate_keeps_environment() {
        let mut environment = Environment::new_global();
        let mut host = Host::new(BufferSink::new(), RecordingSurface::new());

        evaluate(&Node::list(vec![Node::symbol("def"), Node::symbol("x"), Node::Number(3.0)]), &mut environment, &mut host).unwrap();
        let value = evaluate(&Node::list(vec![Node::symbol("*"), Node::symbol("x"), Node::Number(2.0)]), &mut environment, &mut host);

        assert_eq!(value, Ok(Value::Number(6.0)));
    }

    #[test]
    pub fn test_evaluate_restores_global_environment_after_error() {
        let mut environment = Environment::new_global();
        let mut host = Host::new(BufferSink::new(), RecordingSurface::new());
        let program = parse(&tokenize("((def g 1) (func f (a) (def inner 1) (car a)) (f 1))").unwrap()).unwrap();

        assert!(evaluate(&program[0], &mut environment, &mut host).is_err());
        assert_eq!(environment.lookup("g"), Some(&Value::Number(1.0)));
        assert_eq!(environment.lookup("inner"), None);
    }
}
