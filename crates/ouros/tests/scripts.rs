//! End-to-end scenarios from spec.md §8: each runs a source string through
//! `Interpreter::run` and checks the resulting `Object`.

use ouros::{Interpreter, Object};

fn run(src: &str) -> Object {
    Interpreter::new().run(src)
}

fn expect_exception(obj: &Object, exc_type: &str) {
    match obj {
        Object::Exception { exc_type: got, .. } => assert_eq!(got, exc_type, "wrong exception kind"),
        other => panic!("expected {exc_type}, got {other:?}"),
    }
}

#[test]
fn mro_and_super_linearize_diamond_inheritance() {
    let src = r#"
class A:
    def m(self): return "A"
class B(A):
    def m(self): return "B" + super().m()
class C(A):
    def m(self): return "C" + super().m()
class D(B, C):
    def m(self): return "D" + super().m()
D().m()
"#;
    assert_eq!(run(src), Object::Str("DBCA".to_owned()));
}

#[test]
fn generator_yields_across_resumes() {
    let src = r"
def g():
    for i in range(3):
        yield i * i
list(g())
";
    assert_eq!(run(src), Object::List(vec![Object::Int(0), Object::Int(1), Object::Int(4)]));
}

#[test]
fn try_finally_runs_before_break_unwinds_loop() {
    let src = r"
r = []
for i in range(3):
    try:
        r.append(i)
    finally:
        if i == 1:
            break
r
";
    assert_eq!(run(src), Object::List(vec![Object::Int(0), Object::Int(1)]));
}

#[test]
fn comprehension_target_does_not_leak_into_enclosing_scope() {
    let src = r#"
x = "outer"
r = [x for x in range(3)]
(r, x)
"#;
    assert_eq!(
        run(src),
        Object::Tuple(vec![Object::List(vec![Object::Int(0), Object::Int(1), Object::Int(2)]), Object::Str("outer".to_owned())])
    );
}

#[test]
fn nested_coroutines_await_depth_first() {
    let src = r"
async def a():
    return 1
async def b():
    return (await a()) + 10
async def c():
    return (await b()) * 2
await c()
";
    assert_eq!(run(src), Object::Int(22));
}

#[test]
fn dunder_add_dispatches_to_user_method() {
    let src = r"
class N:
    def __init__(self, v):
        self.v = v
    def __add__(self, o):
        return N(self.v + o.v)
(N(3) + N(4)).v
";
    assert_eq!(run(src), Object::Int(7));
}

#[test]
fn int_parse_failure_raises_value_error() {
    expect_exception(&run(r#"int("x")"#), "ValueError");
}

#[test]
fn list_out_of_range_raises_index_error() {
    expect_exception(&run("[1, 2, 3][10]"), "IndexError");
}

#[test]
fn missing_dict_key_raises_key_error() {
    expect_exception(&run(r#"{"a": 1}["b"]"#), "KeyError");
}

#[test]
fn division_by_zero_raises_zero_division_error() {
    expect_exception(&run("1 / 0"), "ZeroDivisionError");
}

#[test]
fn mismatched_operand_types_raise_type_error() {
    expect_exception(&run(r#""a" + 1"#), "TypeError");
}

#[test]
fn unhashable_dict_key_raises_type_error() {
    expect_exception(&run("{[1, 2]: 3}"), "TypeError");
}

#[test]
fn keyword_argument_duplicating_a_positional_binding_raises_type_error() {
    let src = r#"
def f(a, **kw):
    return (a, kw)
f(1, a=2)
"#;
    expect_exception(&run(src), "TypeError");
}

#[test]
fn floor_division_and_modulo_match_sign_of_divisor() {
    assert_eq!(run("(-7) // 2"), Object::Int(-4));
    assert_eq!(run("(-7) % 2"), Object::Int(1));
    assert_eq!(run("7 % -2"), Object::Int(-1));
}

#[test]
fn true_division_always_produces_float() {
    assert_eq!(run("4 / 2"), Object::Float(2.0));
}

#[test]
fn negative_power_binds_tighter_than_unary_minus() {
    assert_eq!(run("-2 ** 2"), Object::Int(-4));
}

#[test]
fn comparison_chains_evaluate_shared_operand_once() {
    let src = r"
calls = []
def probe(x):
    calls.append(x)
    return x
(1 < probe(2) < 3, len(calls))
";
    assert_eq!(run(src), Object::Tuple(vec![Object::Bool(true), Object::Int(1)]));
}

#[test]
fn with_statement_calls_exit_exactly_once_on_exception() {
    let src = r#"
log = []
class Ctx:
    def __enter__(self):
        log.append("enter")
        return self
    def __exit__(self, exc_type, exc_val, exc_tb):
        log.append("exit")
        return True
with Ctx():
    raise ValueError("boom")
log
"#;
    assert_eq!(run(src), Object::List(vec![Object::Str("enter".to_owned()), Object::Str("exit".to_owned())]));
}

#[test]
fn generator_raises_stop_iteration_repeatedly_after_exhaustion() {
    let src = r#"
def g():
    yield 1
it = g()
next(it)
first_done = False
try:
    next(it)
except StopIteration:
    first_done = True
second_done = False
try:
    next(it)
except StopIteration:
    second_done = True
(first_done, second_done)
"#;
    assert_eq!(run(src), Object::Tuple(vec![Object::Bool(true), Object::Bool(true)]));
}

#[test]
fn assert_statement_carries_message_as_args() {
    let src = r#"
try:
    assert 1 == 2, "nope"
except AssertionError as e:
    str(e)
"#;
    assert_eq!(run(src), Object::Str("nope".to_owned()));
}

#[test]
fn del_removes_name_binding() {
    let src = r"
x = 1
del x
try:
    x
except NameError:
    'gone'
";
    assert_eq!(run(src), Object::Str("gone".to_owned()));
}

#[test]
fn class_without_hash_after_defining_eq_is_unhashable() {
    let src = r#"
class P:
    def __init__(self, v):
        self.v = v
    def __eq__(self, other):
        return self.v == other.v
try:
    {P(1): 1}
except TypeError:
    'unhashable'
"#;
    assert_eq!(run(src), Object::Str("unhashable".to_owned()));
}

#[test]
fn starred_assignment_captures_middle_elements() {
    let src = r"
first, *middle, last = [1, 2, 3, 4, 5]
(first, middle, last)
";
    assert_eq!(
        run(src),
        Object::Tuple(vec![Object::Int(1), Object::List(vec![Object::Int(2), Object::Int(3), Object::Int(4)]), Object::Int(5)])
    );
}

#[test]
fn fstring_supports_format_spec_conversion_and_self_documenting_form() {
    let src = r#"
pi = 3.14159
name = "ab"
f"{pi:.2f} {name!r} {1+1=}"
"#;
    assert_eq!(run(src), Object::Str("3.14 'ab' 1+1=2".to_owned()));
}

#[test]
fn recursion_beyond_limit_raises_recursion_error() {
    let src = r"
def f(n):
    return f(n + 1)
f(0)
";
    expect_exception(&run(src), "RecursionError");
}
