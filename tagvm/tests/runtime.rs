extern crate tagvm;

use tagvm::{
    BuiltinType, CallFrame, Config, ErrorKind, HeapSettings, Interpreter, RuntimeError, TypeTag,
    Value,
};

fn greet(interp: &mut Interpreter, frame: &CallFrame) -> Result<Value, RuntimeError> {
    let name = frame.arg(interp, 0);
    let name = interp.string_text(name)?;
    interp.intern(&format!("hello, {}", name))
}

fn tag_index(interp: &mut Interpreter, frame: &CallFrame) -> Result<Value, RuntimeError> {
    let receiver = frame.receiver(interp);
    Ok(Value::int(interp.kind_of(receiver).index() as isize))
}

fn constant_one(_interp: &mut Interpreter, _frame: &CallFrame) -> Result<Value, RuntimeError> {
    Ok(Value::int(1))
}

fn constant_two(_interp: &mut Interpreter, _frame: &CallFrame) -> Result<Value, RuntimeError> {
    Ok(Value::int(2))
}

fn small_heap() -> Config {
    Config {
        heap: HeapSettings::with_young_size(16 * 1024),
        ..Config::default()
    }
}

#[test]
fn greet_and_undefined_message() {
    let mut interp = Interpreter::new(Config::default()).unwrap();

    let greeter = interp.register_type_named(None, "Greeter").unwrap();
    interp.def_native(greeter, "greet", greet).unwrap();

    let instance = interp.object_new(greeter, 1).unwrap();
    let instance = interp.pin(instance);

    let world = interp.intern("world").unwrap();
    let reply = interp
        .send_name(interp.value(instance), "greet", &[world])
        .unwrap();
    assert!(interp.string_text(reply).unwrap() == "hello, world");

    let err = interp
        .send_name(interp.value(instance), "undefined_msg", &[])
        .unwrap_err();
    assert!(err.error_kind() == &ErrorKind::DispatchMiss(String::from("undefined_msg")));

    let message = interp.intern("undefined_msg").unwrap();
    assert!(interp.bind(interp.value(instance), message).unwrap().is_none());
}

#[test]
fn cached_and_uncached_dispatch_agree() {
    let mut interp = Interpreter::new(Config::default()).unwrap();

    let mut receivers = Vec::new();
    for _ in 0..4 {
        let tag = interp.register_type(None).unwrap();
        interp.def_native(tag, "which", tag_index).unwrap();
        let object = interp.object_new(tag, 0).unwrap();
        receivers.push(interp.pin(object));
    }
    interp.def_native(BuiltinType::Number.into(), "which", tag_index).unwrap();

    let message = interp.intern("which").unwrap();
    let message = interp.pin(message);

    for round in 0..3 {
        for (site, receiver) in receivers.iter().enumerate() {
            let receiver = interp.value(*receiver);
            let message = interp.value(message);

            let direct = interp.send(receiver, message, &[]).unwrap();
            let cached = interp.send_cached(site, receiver, message, &[]).unwrap();
            let shared = interp.send_cached(99, receiver, message, &[]).unwrap();
            assert!(direct == cached && cached == shared);

            let bound = interp.bind(receiver, message).unwrap().unwrap();
            let entry = interp.cache_stats();
            assert!(entry.hits + entry.misses > 0);
            assert!(interp.closure_native(bound).unwrap().name == "which");
        }

        if round == 1 {
            interp.collect(0, false).unwrap();
        }
    }

    let number = interp.send_name(Value::int(5), "which", &[]).unwrap();
    assert!(number == Value::int(BuiltinType::Number as isize));
}

#[test]
fn registry_growth_invalidates_cached_sites() {
    let mut interp = Interpreter::new(Config::default()).unwrap();

    let first = interp.register_type(None).unwrap();
    interp.def_native(first, "value", constant_one).unwrap();
    let a = interp.object_new(first, 0).unwrap();
    let a = interp.pin(a);

    let message = interp.intern("value").unwrap();
    let message = interp.pin(message);

    let result = interp
        .send_cached(0, interp.value(a), interp.value(message), &[])
        .unwrap();
    assert!(result == Value::int(1));
    let misses = interp.cache_stats().misses;

    // registering an unrelated type changes the registry size
    let second = interp.register_type(None).unwrap();

    let result = interp
        .send_cached(0, interp.value(a), interp.value(message), &[])
        .unwrap();
    assert!(result == Value::int(1));
    assert!(interp.cache_stats().misses == misses + 1);

    interp.def_native(second, "value", constant_two).unwrap();
    let b = interp.object_new(second, 0).unwrap();
    let b = interp.pin(b);

    let result = interp
        .send_cached(0, interp.value(b), interp.value(message), &[])
        .unwrap();
    assert!(result == Value::int(2));
}

#[test]
fn type_tags_increase_across_collections() {
    let mut interp = Interpreter::new(small_heap()).unwrap();

    let mut last: Option<TypeTag> = None;
    for round in 0..60 {
        let tag = interp.register_type(None).unwrap();
        if let Some(previous) = last {
            assert!(tag.index() == previous.index() + 1);
        }
        last = Some(tag);

        for _ in 0..20 {
            interp.tuple_from(&[Value::int(round), Value::NIL]).unwrap();
        }
        if round % 15 == 0 {
            interp.collect(0, round % 30 == 0).unwrap();
        }
    }

    let last = last.unwrap();
    let vt = interp.vtable_of(last).unwrap();
    assert!(interp.vtable_tag(vt).unwrap() == last);
    assert!(interp.type_count().unwrap() == last.index() + 1);
    assert!(interp.gc_stats().minors > 0);
}

#[test]
fn old_to_young_references_survive_a_minor_collection() {
    let mut interp = Interpreter::new(Config::default()).unwrap();

    let tag = interp.register_type(None).unwrap();
    let holder = interp.object_new(tag, 2).unwrap();
    let holder = interp.pin(holder);

    interp.collect(0, true).unwrap();
    let remembered = interp.gc_stats().remembered;

    let young = interp.tuple_from(&[Value::int(7), Value::int(8)]).unwrap();
    interp.set_slot(interp.value(holder), 0, young).unwrap();
    assert!(interp.gc_stats().remembered == remembered + 1);

    interp.collect(0, false).unwrap();

    let tuple = interp.slot(interp.value(holder), 0).unwrap();
    assert!(interp.tuple_items(tuple).unwrap() == vec![Value::int(7), Value::int(8)]);
}

#[test]
fn churn_through_a_small_heap() {
    let mut interp = Interpreter::new(small_heap()).unwrap();

    let kept = interp.tuple_empty().unwrap();
    let kept = interp.pin(kept);

    for i in 0..4000 {
        let tuple = interp.tuple_from(&[Value::int(i), Value::TRUE]).unwrap();
        if i % 7 == 0 {
            interp.tuple_push(kept, tuple).unwrap();
        }
    }

    let kept = interp.value(kept);
    let len = interp.tuple_len(kept).unwrap();
    assert!(len == (0..4000).filter(|i| i % 7 == 0).count());

    for index in 0..len {
        let tuple = interp.tuple_at(kept, index).unwrap();
        assert!(interp.tuple_at(tuple, 0).unwrap() == Value::int(7 * index as isize));
        assert!(interp.tuple_at(tuple, 1).unwrap() == Value::TRUE);
    }

    let stats = interp.gc_stats();
    assert!(stats.minors > 0);
    assert!(stats.reserved >= stats.actual);
}

#[test]
fn interpreters_are_isolated() {
    let mut a = Interpreter::new(Config::default()).unwrap();
    let mut b = Interpreter::new(Config::default()).unwrap();

    let tag = a.register_type(None).unwrap();
    assert!(b.vtable_of(tag).is_err());

    b.intern("only in b").unwrap();
    assert!(b.interned_count() == a.interned_count() + 1);
}

#[test]
fn front_end_allocates_and_collects() {
    let mut interp = Interpreter::new(small_heap()).unwrap();

    let point = interp.register_type_named(None, "Point").unwrap();
    let object = interp.allocate(32, point).unwrap();
    assert!(interp.slot_count(object).unwrap() == 2);
    let object = interp.pin(object);
    interp.collect(0, true).unwrap();

    let before = interp.gc_stats();
    let pair = interp.tuple_from(&[Value::int(3), Value::int(4)]).unwrap();
    interp.set_slot(interp.value(object), 1, pair).unwrap();
    interp.write_barrier(interp.value(object), pair).unwrap();
    assert!(interp.gc_stats().remembered == before.remembered + 1);

    interp.collect(4096, false).unwrap();

    let after = interp.gc_stats();
    assert!(after.minors == before.minors + 1);
    assert!(after.remembered == 0);

    let pair = interp.slot(interp.value(object), 1).unwrap();
    assert!(interp.tuple_items(pair).unwrap() == vec![Value::int(3), Value::int(4)]);
    assert!(interp.allocate(16, BuiltinType::Boolean.into()).is_err());
}
