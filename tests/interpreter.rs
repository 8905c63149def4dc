mod common;

#[cfg(test)]
mod interpreter_tests {
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use rox::callable::Callable;
    use rox::error::{LoxError, Result};
    use rox::interpreter::Interpreter;
    use rox::value::Value;

    use crate::common::{capturing_interpreter, errors_of, output_of, run};

    #[test]
    fn test_arithmetic_and_printing() {
        assert_eq!(
            output_of("print 1 + 2 * 3; print 4.0; print 4.5; print -0.5 * 2; print 7 / 2;"),
            "7\n4\n4.5\n-1\n3.5\n"
        );
    }

    #[test]
    fn test_division_by_zero_is_ieee() {
        assert_eq!(output_of("print 1 / 0; print -1 / 0;"), "inf\n-inf\n");
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            output_of("print \"a\" + \"b\"; print \"n=\" + 4; print 2.5 + \"x\"; print \"\" + nil;"),
            "ab\nn=4\n2.5x\nnil\n"
        );
    }

    #[test]
    fn test_truthiness_and_logic() {
        assert_eq!(
            output_of(
                "print !nil; print !0; print !\"\";\n\
                 print nil or \"yes\"; print false and crash; print 1 and 2;"
            ),
            "true\nfalse\nfalse\nyes\nfalse\n2\n"
        );
    }

    #[test]
    fn test_equality() {
        assert_eq!(
            output_of(
                "print 1 == 1; print \"a\" == \"a\"; print nil == false; print 1 == \"1\";\n\
                 class A {} var a = A(); var b = a; print a == b; print a == A();"
            ),
            "true\ntrue\nfalse\nfalse\ntrue\nfalse\n"
        );
    }

    #[test]
    fn test_static_errors_prevent_execution() {
        let (output, errors) = errors_of("print \"side effect\";\nreturn 1;\nprint this;");

        assert_eq!(output, "");
        assert_eq!(
            errors,
            vec![
                "[line 2] Error at 'return': Can't return from top-level code.",
                "[line 3] Error at 'this': Can't use 'this' outside of a class.",
            ]
        );
    }

    #[test]
    fn test_closure_counter_keeps_state() {
        let program = r#"
            fun makeCounter() {
                var count = 0;
                fun increment() {
                    count = count + 1;
                    return count;
                }
                return increment;
            }

            var counter = makeCounter();
            print counter();
            print counter();

            var other = makeCounter();
            print other();
            print counter();
        "#;

        assert_eq!(output_of(program), "1\n2\n1\n3\n");
    }

    #[test]
    fn test_shadowing() {
        assert_eq!(
            output_of("var a = 1; { var a = 2; print a; } print a;"),
            "2\n1\n"
        );
    }

    #[test]
    fn test_closure_sees_binding_at_definition() {
        let program = r#"
            var a = "global";
            {
                fun show() { print a; }
                show();
                var a = "block";
                show();
            }
        "#;

        assert_eq!(output_of(program), "global\nglobal\n");
    }

    #[test]
    fn test_self_reference_in_initializer_is_static() {
        let (output, errors) = errors_of("var a = 1; { var a = a; }");

        assert_eq!(output, "");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Can't read local variable in its own initializer."));
    }

    #[test]
    fn test_super_dispatch_binds_this_to_subclass_instance() {
        let program = r#"
            class A {
                method() { print "A method " + this.name; }
            }

            class B < A {
                method() {
                    print "B method";
                    super.method();
                }
            }

            var b = B();
            b.name = "of b";
            b.method();
        "#;

        assert_eq!(output_of(program), "B method\nA method of b\n");
    }

    #[test]
    fn test_inherited_methods_and_super_chain() {
        let program = r#"
            class A { say() { return "A"; } }
            class B < A { say() { return "B" + super.say(); } }
            class C < B { say() { return "C" + super.say(); } }
            class D < C {}
            print D().say();
        "#;

        assert_eq!(output_of(program), "CBA\n");
    }

    #[test]
    fn test_initializer_returns_instance() {
        let program = r#"
            class C {
                init(x) { this.x = x; }
            }
            var c = C(5);
            print c.x == 5;
            print c;
            print c.init(7) == c;
            print c.x;
        "#;

        assert_eq!(output_of(program), "true\nC instance\ntrue\n7\n");
    }

    #[test]
    fn test_initializer_bare_return_still_yields_instance() {
        let program = r#"
            class P {
                init(flag) {
                    this.set = true;
                    if (flag) return;
                    this.set = false;
                }
            }
            print P(true).set;
            print P(false).set;
        "#;

        assert_eq!(output_of(program), "true\nfalse\n");
    }

    #[test]
    fn test_instance_fields_visible_through_global() {
        let (mut interpreter, _) = capturing_interpreter();
        rox::run("class C { init(x) { this.x = x; } } var c = C(5);", &mut interpreter)
            .unwrap();

        let Some(Value::Instance(instance)) = interpreter.global("c") else {
            panic!("expected an instance");
        };
        assert_eq!(instance.borrow().class.name, "C");
    }

    #[test]
    fn test_arity_mismatch() {
        let (_, errors) = errors_of("fun f(a, b) {}\nf(1);");
        assert_eq!(errors, vec!["Expected 2 arguments but got 1.\n[line 2]"]);

        let (_, errors) = errors_of("fun f(a, b) {}\nf(1, 2, 3);");
        assert_eq!(errors, vec!["Expected 2 arguments but got 3.\n[line 2]"]);

        let (_, errors) = errors_of("class A {}\nA(1);");
        assert_eq!(errors, vec!["Expected 0 arguments but got 1.\n[line 2]"]);
    }

    #[test]
    fn test_break_only_exits_innermost_loop() {
        let program = r#"
            for (var i = 0; i < 3; i = i + 1) {
                var j = 0;
                while (true) {
                    if (j == 2) break;
                    print i + ":" + j;
                    j = j + 1;
                }
            }
            print "done";
        "#;

        assert_eq!(
            output_of(program),
            "0:0\n0:1\n1:0\n1:1\n2:0\n2:1\ndone\n"
        );
    }

    #[test]
    fn test_return_from_inside_loop() {
        let program = r#"
            fun find() {
                for (var i = 0; ; i = i + 1) {
                    if (i * i > 10) return i;
                }
            }
            print find();
        "#;

        assert_eq!(output_of(program), "4\n");
    }

    #[test]
    fn test_redefinition() {
        let (output, errors) = errors_of("var a = 1;\nprint a;\nvar a = 2;\nprint a;");
        assert_eq!(output, "1\n");
        assert_eq!(
            errors,
            vec!["Redefining existing variable 'a' is not allowed.\n[line 3]"]
        );

        let (_, errors) = errors_of("{ var a = 1; var a = 2; }");
        assert_eq!(
            errors,
            vec!["[line 1] Error at 'a': Already a variable with this name in this scope."]
        );

        assert_eq!(output_of("{ var a = 1; { var a = 2; print a; } }"), "2\n");
    }

    #[test]
    fn test_runtime_error_aborts_the_run() {
        let (output, errors) = errors_of("print 1;\nprint -\"x\";\nprint 2;");

        assert_eq!(output, "1\n");
        assert_eq!(errors, vec!["Operand must be a number.\n[line 2]"]);
    }

    #[test]
    fn test_runtime_error_messages() {
        let cases = [
            ("print 1 < \"a\";", "Operands must be numbers.\n[line 1]"),
            ("print nil + 1;", "Operands must be two numbers or at least one string.\n[line 1]"),
            ("print missing;", "Undefined variable 'missing'.\n[line 1]"),
            ("missing = 1;", "Undefined variable 'missing'.\n[line 1]"),
            ("\"str\"();", "Can only call functions and classes.\n[line 1]"),
            ("var x = 1; print x.y;", "Only instances have properties.\n[line 1]"),
            ("var x = 1; x.y = 2;", "Only instances have fields.\n[line 1]"),
            ("class A {} print A().nope;", "Undefined property 'nope'.\n[line 1]"),
            ("var B = 1; class A < B {}", "Superclass must be a class.\n[line 1]"),
            (
                "class A {} class B < A { m() { return super.nope; } } B().m();",
                "Undefined property 'nope'.\n[line 1]",
            ),
        ];

        for (source, expected) in cases {
            let (_, errors) = errors_of(source);
            assert_eq!(errors, vec![expected.to_string()], "source: {}", source);
        }
    }

    #[test]
    fn test_value_rendering() {
        let program = r#"
            fun named() {}
            class K { m() {} }
            print named;
            print fun () {};
            print clock;
            print K;
            print K();
            print K().m;
            print nil;
        "#;

        assert_eq!(
            output_of(program),
            "<fn named>\n<fn>\n<native fn clock>\nK\nK instance\n<fn m>\nnil\n"
        );
    }

    #[test]
    fn test_anonymous_function_closure() {
        let program = r#"
            fun apply(f, x) { return f(x); }
            var base = 10;
            var add = fun (n) { print base + n; };
            apply(add, 5);
        "#;

        assert_eq!(output_of(program), "15\n");
    }

    #[test]
    fn test_clock_is_a_number() {
        assert_eq!(output_of("print clock() > 0;"), "true\n");
    }

    #[test]
    fn test_fields_shadow_methods() {
        let program = r#"
            class A { m() { return "method"; } }
            var a = A();
            print a.m();
            a.m = fun () { print "field"; };
            a.m();
        "#;

        assert_eq!(output_of(program), "method\nfield\n");
    }

    #[test]
    fn test_bound_method_remembers_instance() {
        let program = r#"
            class Box {
                init(v) { this.v = v; }
                get() { return this.v; }
            }
            var m = Box(3).get;
            print m();
        "#;

        assert_eq!(output_of(program), "3\n");
    }

    #[test]
    fn test_recursion() {
        let program = r#"
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(15);
        "#;

        assert_eq!(output_of(program), "610\n");
    }

    #[test]
    fn test_stack_overflow_is_a_runtime_error() {
        let (mut interpreter, buffer) = capturing_interpreter();
        interpreter.set_max_call_depth(32);

        let errors = rox::run("fun down(n) { return down(n + 1); }\ndown(0);", &mut interpreter)
            .unwrap_err();

        assert_eq!(buffer.contents(), "");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "Stack overflow.\n[line 1]");

        // the interpreter is still usable afterwards
        rox::run("print 1;", &mut interpreter).unwrap();
        assert_eq!(buffer.contents(), "1\n");
    }

    #[test]
    fn test_default_call_depth_trips_before_host_stack() {
        const DEEP: &str = "fun f(n) { if (n <= 0) return 0; return 1 + f(n - 1); }\nprint f(1000);";
        const SHALLOW: &str = "fun f(n) { if (n <= 0) return 0; return 1 + f(n - 1); }\nprint f(200);";

        // An ordinary main-thread sized stack, nothing raised.
        let (deep, shallow) = std::thread::Builder::new()
            .stack_size(8 * 1024 * 1024)
            .spawn(|| (errors_of(DEEP), output_of(SHALLOW)))
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(deep.0, "");
        assert_eq!(deep.1, vec!["Stack overflow.\n[line 1]"]);
        assert_eq!(shallow, "200\n");
    }

    #[test]
    fn test_session_keeps_globals_across_runs() {
        let (mut interpreter, buffer) = capturing_interpreter();

        rox::run("var greeting = \"hi\"; fun greet(n) { return greeting + \" \" + n; }", &mut interpreter)
            .unwrap();
        assert!(rox::run("print nope;", &mut interpreter).is_err());
        rox::run("print greet(\"there\");", &mut interpreter).unwrap();

        assert_eq!(buffer.contents(), "hi there\n");
    }

    #[derive(Debug)]
    struct Double;

    impl Callable for Double {
        fn name(&self) -> &str {
            "double"
        }

        fn arity(&self) -> usize {
            1
        }

        fn call(
            self: Rc<Self>,
            _interpreter: &mut Interpreter,
            arguments: Vec<Value>,
            line: usize,
        ) -> Result<Value> {
            match &arguments[0] {
                Value::Number(n) => Ok(Value::Number(n * 2.0)),
                _ => Err(LoxError::runtime(line, "double expects a number.")),
            }
        }
    }

    #[test]
    fn test_define_native() {
        let (mut interpreter, buffer) = capturing_interpreter();
        interpreter.define_native(Rc::new(Double)).unwrap();

        rox::run("print double(21); print double;", &mut interpreter).unwrap();
        assert_eq!(buffer.contents(), "42\n<native fn double>\n");

        let errors = rox::run("double(\"x\");", &mut interpreter).unwrap_err();
        assert_eq!(errors[0].to_string(), "double expects a number.\n[line 1]");

        assert!(interpreter.define_native(Rc::new(Double)).is_err());
    }

    #[test]
    fn test_operands_evaluated_left_to_right() {
        let program = r#"
            var log = "";
            fun mark(s, v) { log = log + s; return v; }
            print mark("a", 1) + mark("b", 2);
            fun three(x, y, z) {}
            three(mark("c", 1), mark("d", 2), mark("e", 3));
            print log;
        "#;

        assert_eq!(output_of(program), "3\nabcde\n");
    }

    #[test]
    fn test_run_reports_lex_and_parse_errors() {
        let (output, result) = run("print @;");
        assert_eq!(output, "");

        let errors = result.unwrap_err();
        assert!(errors.iter().all(LoxError::is_static));
        assert_eq!(errors[0].exit_code(), 65);
    }
}
