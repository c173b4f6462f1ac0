use crate::{ArrayKind, Error, ErrorKind, Span, Tree, Value, ValueKind, parse};
use std::fmt::Write as _;

fn parse_ok(input: &str) -> Tree<'_> {
    parse(input).unwrap_or_else(|e| panic!("parse failed for {input:?}: {e}"))
}

fn parse_err(input: &str) -> Error {
    match parse(input) {
        Ok(tree) => panic!("expected error for {input:?}, got {tree:?}"),
        Err(e) => e,
    }
}

#[test]
fn basic_scalar_values() {
    let v = parse_ok("");
    assert!(v.root().is_empty());

    let v = parse_ok("a = \"hello\"");
    assert_eq!(v.root().get("a").and_then(Value::as_str), Some("hello"));

    let v = parse_ok("a = 42");
    assert_eq!(v.root().get("a").and_then(Value::as_integer), Some(42));
    let v = parse_ok("a = -100");
    assert_eq!(v.root().get("a").and_then(Value::as_integer), Some(-100));
    let v = parse_ok("a = +7");
    assert_eq!(v.root().get("a").and_then(Value::as_integer), Some(7));

    let v = parse_ok("a = 3.25");
    assert_eq!(v.root().get("a").and_then(Value::as_float), Some(3.25));

    let v = parse_ok("a = true\nb = false");
    assert_eq!(v.root().get("a").and_then(Value::as_bool), Some(true));
    assert_eq!(v.root().get("b").and_then(Value::as_bool), Some(false));

    let v = parse_ok("a = 1\nb = 2\nc = 3");
    assert_eq!(v.root().len(), 3);
    assert_eq!(v.root().get("c").and_then(Value::as_integer), Some(3));
}

#[test]
fn integer_formats() {
    let cases = [
        ("0", 0),
        ("-0", 0),
        ("1_000_000", 1_000_000),
        ("0xDEADbeef", 0xDEAD_BEEF),
        ("0xdead_beef", 0xDEAD_BEEF),
        ("0o755", 0o755),
        ("0b1101_0101", 0b1101_0101),
        ("9223372036854775807", i64::MAX),
        ("-9223372036854775808", i64::MIN),
    ];
    for (text, expected) in cases {
        let doc = format!("n = {text}");
        let v = parse_ok(&doc);
        assert_eq!(
            v.root().get("n").and_then(Value::as_integer),
            Some(expected),
            "input: {text}"
        );
    }
}

#[test]
fn float_formats() {
    let cases = [
        ("1.5", 1.5),
        ("-0.01", -0.01),
        ("5e2", 500.0),
        ("5E+2", 500.0),
        ("6.26e-2", 0.0626),
        ("1_000.000_1", 1000.0001),
        ("inf", f64::INFINITY),
        ("-inf", f64::NEG_INFINITY),
    ];
    for (text, expected) in cases {
        let doc = format!("f = {text}");
        let v = parse_ok(&doc);
        assert_eq!(
            v.root().get("f").and_then(Value::as_float),
            Some(expected),
            "input: {text}"
        );
    }
    let v = parse_ok("f = nan\ng = -nan");
    assert!(v.root().get("f").and_then(Value::as_float).unwrap().is_nan());
    assert!(v.root().get("g").and_then(Value::as_float).unwrap().is_nan());
}

#[test]
fn malformed_numbers() {
    for text in [
        "01", "1__2", "_1", "1_", "0x", "0x_1", "+0x1", "0x+1", "0x-1", "0xg1", ".5", "5.",
        "1.e3", "1e", "9e999999", "92233720368547758080", "tru", "yes", "1 2",
    ] {
        let doc = format!("n = {text}");
        let err = parse_err(&doc);
        assert_eq!(err.kind, ErrorKind::InvalidValue, "input: {text}");
    }
}

#[test]
fn datetime_values() {
    let v = parse_ok("d = 1979-05-27T07:32:00Z");
    assert_eq!(
        v.root().get("d").map(Value::kind),
        Some(ValueKind::OffsetDatetime)
    );
    let v = parse_ok("d = 1979-05-27T07:32:00");
    assert_eq!(
        v.root().get("d").map(Value::kind),
        Some(ValueKind::LocalDatetime)
    );
    let v = parse_ok("d = 1979-05-27");
    assert_eq!(v.root().get("d").map(Value::kind), Some(ValueKind::LocalDate));
    let v = parse_ok("d = 07:32:00.5");
    assert_eq!(v.root().get("d").map(Value::kind), Some(ValueKind::LocalTime));
    let t = v.root().get("d").and_then(Value::as_datetime).unwrap();
    assert_eq!(t.time.map(|t| t.nanosecond), Some(500_000_000));

    // space-separated form reaches past the token boundary
    let v = parse_ok("d = 1979-05-27 07:32:00 # launch");
    assert_eq!(
        v.root().get("d").map(Value::kind),
        Some(ValueKind::LocalDatetime)
    );

    // leap second
    let v = parse_ok("d = 1990-12-31T23:59:60Z");
    let t = v.root().get("d").and_then(Value::as_datetime).unwrap();
    assert_eq!(t.time.map(|t| t.second), Some(60));

    assert_eq!(parse_err("d = 2023-02-29").kind, ErrorKind::InvalidValue);
    assert_eq!(parse_err("d = 24:00:00").kind, ErrorKind::InvalidValue);
}

#[test]
fn string_value_forms() {
    let v = parse_ok("a = 'literal\\no escape'\nb = \"basic\\tescape\"");
    assert_eq!(
        v.root().get("a").and_then(Value::as_str),
        Some("literal\\no escape")
    );
    assert_eq!(
        v.root().get("b").and_then(Value::as_str),
        Some("basic\tescape")
    );

    let v = parse_ok("a = \"\"\"\nmulti\nline\"\"\"\nb = '''\nraw 'quote' here'''");
    assert_eq!(v.root().get("a").and_then(Value::as_str), Some("multi\nline"));
    assert_eq!(
        v.root().get("b").and_then(Value::as_str),
        Some("raw 'quote' here")
    );

    let err = parse_err("a = \"bad\\zescape\"");
    assert_eq!(err.kind, ErrorKind::InvalidEscape('z'));
}

#[test]
fn tables_and_headers() {
    let v = parse_ok("[server]\nhost = \"h\"\nport = 80\n[client]\nretry = true");
    let server = v.root().get_table("server").unwrap();
    assert_eq!(server.get("host").and_then(Value::as_str), Some("h"));
    assert_eq!(server.get("port").and_then(Value::as_integer), Some(80));
    let client = v.root().get_table("client").unwrap();
    assert_eq!(client.get("retry").and_then(Value::as_bool), Some(true));

    // deep header paths create implicit intermediates
    let v = parse_ok("[a.b.c]\nx = 1");
    let x = v
        .root()
        .get_table("a")
        .and_then(|t| t.get_table("b"))
        .and_then(|t| t.get_table("c"))
        .and_then(|t| t.get("x"))
        .and_then(Value::as_integer);
    assert_eq!(x, Some(1));

    // an implicit table can be claimed by a later header, once
    let v = parse_ok("[a.b]\nx = 1\n[a]\ny = 2");
    let a = v.root().get_table("a").unwrap();
    assert_eq!(a.len(), 2);
    assert_eq!(a.get("y").and_then(Value::as_integer), Some(2));

    // quoted and dotted header segments
    let v = parse_ok("[dog.\"tater.man\"]\ntype = \"pug\"");
    let t = v
        .root()
        .get_table("dog")
        .and_then(|t| t.get_table("tater.man"))
        .unwrap();
    assert_eq!(t.get("type").and_then(Value::as_str), Some("pug"));

    // header span is recorded
    let v = parse_ok("[server]\n");
    assert_eq!(v.root().get_table("server").unwrap().span(), Span::new(0, 8));
}

#[test]
fn dotted_keys() {
    let v = parse_ok("server.host = \"h\"\nserver.port = 80");
    let server = v.root().get_table("server").unwrap();
    assert_eq!(server.len(), 2);
    assert_eq!(server.get("port").and_then(Value::as_integer), Some(80));

    // dotted under a header lands in that table
    let v = parse_ok("[outer]\ninner.x = 1\ninner.y = 2");
    let inner = v
        .root()
        .get_table("outer")
        .and_then(|t| t.get_table("inner"))
        .unwrap();
    assert_eq!(inner.len(), 2);
}

#[test]
fn duplicate_and_conflict_errors() {
    let err = parse_err("a = 1\na = 2");
    assert_eq!(
        err.kind,
        ErrorKind::DuplicateKey {
            key: "a".into(),
            first: Span::new(0, 1),
        }
    );
    assert_eq!(err.span, Span::new(6, 7));
    assert_eq!(err.line_info, Some((1, 0)));

    let err = parse_err("[t]\n[t]");
    assert_eq!(
        err.kind,
        ErrorKind::DuplicateTable {
            name: "t".into(),
            first: Span::new(0, 3),
        }
    );

    // dotted key through a scalar
    let err = parse_err("a = 1\na.b = 2");
    assert_eq!(
        err.kind,
        ErrorKind::KeyNotTable {
            first: Span::new(0, 1)
        }
    );
    // dotted key into a header-defined table
    assert!(matches!(
        parse_err("[a.b]\n[a]\nb.c = 1").kind,
        ErrorKind::KeyNotTable { .. }
    ));
    // dotted key into an inline table
    assert!(matches!(
        parse_err("t = {a = 1}\nt.b = 2").kind,
        ErrorKind::KeyNotTable { .. }
    ));
    // header into an inline table
    assert!(matches!(
        parse_err("t = {a = 1}\n[t.b]").kind,
        ErrorKind::KeyNotTable { .. }
    ));

    // a header naming an existing key
    assert!(matches!(
        parse_err("[a]\nx = 1\n[a.x]").kind,
        ErrorKind::DuplicateTable { .. }
    ));
    // reopening an array of tables as a table
    assert!(matches!(
        parse_err("[[x]]\n[x]").kind,
        ErrorKind::DuplicateTable { .. }
    ));
    // redefining a table or plain array as an array of tables
    assert_eq!(parse_err("[x]\n[[x]]").kind, ErrorKind::RedefineAsArray);
    assert_eq!(parse_err("x = [1]\n[[x]]").kind, ErrorKind::RedefineAsArray);
}

#[test]
fn arrays_and_homogeneity() {
    let v = parse_ok("a = [1, 2, 3]");
    let a = v.root().get_array("a").unwrap();
    assert_eq!(a.len(), 3);
    assert_eq!(a.kind(), ArrayKind::Uniform(ValueKind::Integer));
    assert_eq!(a.get(1).and_then(Value::as_integer), Some(2));

    let v = parse_ok("a = []");
    assert_eq!(v.root().get_array("a").unwrap().kind(), ArrayKind::Empty);

    let v = parse_ok("a = [1, \"two\", 3.0]");
    assert_eq!(v.root().get_array("a").unwrap().kind(), ArrayKind::Mixed);

    // nested arrays are uniform at the outer level
    let v = parse_ok("a = [[1, 2], [\"x\"]]");
    let a = v.root().get_array("a").unwrap();
    assert_eq!(a.kind(), ArrayKind::Uniform(ValueKind::Array));
    let inner = a.get(0).and_then(Value::as_array).map(|id| v.array(id)).unwrap();
    assert_eq!(inner.len(), 2);

    // brackets and commas inside string elements
    let v = parse_ok("a = [\"]\", \"a,b\", 2]");
    let a = v.root().get_array("a").unwrap();
    assert_eq!(a.len(), 3);
    assert_eq!(a.kind(), ArrayKind::Mixed);
    assert_eq!(a.get(0).and_then(Value::as_str), Some("]"));

    // multi-line arrays with comments and trailing comma
    let v = parse_ok("a = [\n  1, # first\n  2,\n]\n");
    assert_eq!(v.root().get_array("a").unwrap().len(), 2);
}

#[test]
fn inline_tables() {
    let v = parse_ok("point = {x = 1, y = 2}");
    let p = v.root().get_table("point").unwrap();
    assert_eq!(p.len(), 2);
    assert_eq!(p.get("y").and_then(Value::as_integer), Some(2));

    let v = parse_ok("empty = {}");
    assert!(v.root().get_table("empty").unwrap().is_empty());

    let v = parse_ok("nested = {a = {b = [1, {c = 2}]}}");
    let b = v
        .root()
        .get_table("nested")
        .and_then(|t| t.get_table("a"))
        .and_then(|t| t.get_array("b"))
        .unwrap();
    assert_eq!(b.len(), 2);

    let err = parse_err("p = {x = 1, x = 2}");
    assert!(matches!(err.kind, ErrorKind::DuplicateKey { .. }));

    // dotted keys are not accepted inside inline tables
    assert_eq!(parse_err("p = {a.b = 1}").kind, ErrorKind::InvalidKey);
}

#[test]
fn arrays_of_tables() {
    let doc = "\
[[product]]
name = \"nail\"
sku = 1

[[product]]

[[product]]
name = \"hammer\"
";
    let v = parse_ok(doc);
    let products = v.root().get_array("product").unwrap();
    assert_eq!(products.len(), 3);
    assert_eq!(products.kind(), ArrayKind::Uniform(ValueKind::Table));
    let first = products.get(0).and_then(Value::as_table).map(|id| v.table(id)).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first.get("name").and_then(Value::as_str), Some("nail"));
    let second = products.get(1).and_then(Value::as_table).map(|id| v.table(id)).unwrap();
    assert!(second.is_empty());

    // sub-tables attach to the latest element
    let doc = "\
[[fruit]]
name = \"apple\"
[fruit.physical]
color = \"red\"
[[fruit]]
name = \"banana\"
";
    let v = parse_ok(doc);
    let fruit = v.root().get_array("fruit").unwrap();
    assert_eq!(fruit.len(), 2);
    let apple = fruit.get(0).and_then(Value::as_table).map(|id| v.table(id)).unwrap();
    assert_eq!(apple.len(), 2);
    let physical = apple.get_table("physical").unwrap();
    assert_eq!(physical.get("color").and_then(Value::as_str), Some("red"));
    let banana = fruit.get(1).and_then(Value::as_table).map(|id| v.table(id)).unwrap();
    assert_eq!(banana.len(), 1);
}

#[test]
fn line_endings_and_comments() {
    let v = parse_ok("a = 1\r\n[t]\r\nb = 2 # trailing\r\n");
    assert_eq!(v.root().get("a").and_then(Value::as_integer), Some(1));
    assert_eq!(
        v.root()
            .get_table("t")
            .and_then(|t| t.get("b"))
            .and_then(Value::as_integer),
        Some(2)
    );

    // a bare carriage return is not a line ending
    assert!(parse("a = 1\rb = 2").is_err());
    // ... inside inline containers either
    let v = parse_ok("a = [1,\r\n 2]\nt = { x = 1,\r\n y = 2 }");
    assert_eq!(v.root().get_array("a").unwrap().len(), 2);
    assert_eq!(v.root().get_table("t").unwrap().len(), 2);
    assert_eq!(parse_err("a = [1,\r 2]").kind, ErrorKind::InvalidValue);
    assert_eq!(parse_err("t = { x = 1,\r y = 2 }").kind, ErrorKind::InvalidValue);

    // text after a value
    let err = parse_err("a = 1 b = 2");
    assert_eq!(err.kind, ErrorKind::InvalidValue);
    assert_eq!(err.span, Span::at(6));
    // ... or after a header
    assert_eq!(parse_err("[t] x").kind, ErrorKind::InvalidValue);
}

#[test]
fn error_positions_carry_line_info() {
    let err = parse_err("ok = 1\nbad = \"unclosed");
    assert_eq!(err.kind, ErrorKind::MissingClose);
    assert_eq!(err.line_info, Some((1, 6)));

    let err = parse_err("[t]\nx = 01");
    assert_eq!(err.line_info, Some((1, 4)));
}

#[test]
fn every_store_is_filled_exactly() {
    let docs = [
        "",
        "a = 1\nb = [1, [2, 3], {c = 4}]\n",
        "[a.b.c]\nx = 1\n[a]\ny = 2\nz.w = 3\n",
        "[[p]]\na = 1\n[[p]]\n[p.sub]\nb = 2\n[[p]]\n",
        "m = {}\nn = []\no = [[], [[]]]\n",
        "t = { long = [\n1,\n2,\n3,\n] }\n",
    ];
    for doc in docs {
        let v = parse_ok(doc);
        v.assert_exactly_filled();
    }
}

#[test]
fn deeply_nested_value() {
    // 70 levels exercises the bracket matcher's spilled windows end to end
    let mut doc = String::from("deep = ");
    doc.push_str(&"[".repeat(70));
    doc.push('1');
    doc.push_str(&"]".repeat(70));
    let v = parse_ok(&doc);
    v.assert_exactly_filled();
    let mut cur = v.root().get_array("deep").unwrap();
    for _ in 0..69 {
        let inner = cur.get(0).and_then(Value::as_array).unwrap();
        cur = v.array(inner);
    }
    assert_eq!(cur.get(0).and_then(Value::as_integer), Some(1));
}

#[test]
fn handle_space_is_finite() {
    // more keys than a 16-bit count can hold
    let mut doc = String::with_capacity(1 << 20);
    for i in 0..70_000 {
        writeln!(doc, "k{i} = 1").unwrap();
    }
    assert_eq!(parse_err(&doc).kind, ErrorKind::CapacityExceeded);

    // ... and the same number spread across tables is fine
    let mut doc = String::with_capacity(1 << 20);
    for t in 0..700 {
        writeln!(doc, "[t{t}]").unwrap();
        for k in 0..100 {
            writeln!(doc, "k{k} = 1").unwrap();
        }
    }
    let v = parse_ok(&doc);
    assert_eq!(v.root().len(), 700);
    v.assert_exactly_filled();
}

fn random_document(rng: &mut oorandom::Rand32) -> String {
    let mut doc = String::new();
    for t in 0..rng.rand_range(1..5) {
        writeln!(doc, "[table{t}]").unwrap();
        for k in 0..rng.rand_range(0..7) {
            match rng.rand_range(0..5) {
                0 => writeln!(doc, "k{k} = {}", rng.rand_i32()).unwrap(),
                1 => writeln!(doc, "k{k} = \"s{}\"", rng.rand_u32()).unwrap(),
                2 => writeln!(doc, "k{k} = {}", rng.rand_u32() % 2 == 0).unwrap(),
                3 => {
                    let n = rng.rand_range(0..4);
                    let elems: Vec<String> =
                        (0..n).map(|_| rng.rand_i32().to_string()).collect();
                    writeln!(doc, "k{k} = [{}]", elems.join(", ")).unwrap();
                }
                _ => writeln!(doc, "k{k} = {{ x = {}, y = true }}", rng.rand_i32()).unwrap(),
            }
        }
    }
    doc
}

#[test]
fn generated_documents_parse_deterministically() {
    for seed in 0..50 {
        let mut rng = oorandom::Rand32::new(seed);
        let doc = random_document(&mut rng);
        let first = parse_ok(&doc);
        first.assert_exactly_filled();
        let second = parse_ok(&doc);
        assert_eq!(format!("{first:?}"), format!("{second:?}"), "seed {seed}");
    }
}
