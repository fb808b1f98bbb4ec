use ouros::{Interpreter, Object};

fn main() {
    // --- Basic execution, with host-injected globals ---
    let interp = Interpreter::new();
    interp.set_global("x", Object::Int(10));
    interp.set_global("y", Object::Int(20));

    let result = interp.run("x + y");
    assert_eq!(result, Object::Int(30));
    println!("Basic: {result}"); // 30

    // --- Fibonacci, same interpreter, a fresh global reused across runs ---
    interp.set_global("x", Object::Int(10));
    let fib_result = interp.run(
        r"
def fib(n):
    if n <= 1:
        return n
    return fib(n - 1) + fib(n - 2)

fib(x)
",
    );
    assert_eq!(fib_result, Object::Int(55));
    println!("Fibonacci(10): {fib_result}"); // 55

    // --- Reading a binding back out after the run ---
    interp.run(
        r#"
greeting = "hello " + "world"
"#,
    );
    let greeting = interp.get_global("greeting").expect("greeting was bound");
    assert_eq!(greeting, Object::Str("hello world".to_owned()));
    println!("Greeting: {greeting}");

    // --- Uncaught exceptions surface as Object::Exception, never a panic ---
    let failure = interp.run("1 / 0");
    match failure {
        Object::Exception { exc_type, message } => {
            println!("Caught: {exc_type}: {message}");
        }
        other => panic!("expected an exception, got {other:?}"),
    }

    println!("All examples passed.");
}
