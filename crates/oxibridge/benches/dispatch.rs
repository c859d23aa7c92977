// Message dispatch benchmarks
//
// This benchmark suite measures:
// - Sends to nil (no runtime involvement)
// - Instance and class method sends through the lookup cache
// - Struct-by-value returns
// - Sends to methods declared at run time

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use oxibridge::{Bool, Class, ClassDecl, Id, Rect, Sel, msg_send, sel};

extern "C" fn constant(_this: Id, _cmd: Sel) -> i64 {
    42
}

fn declared_class() -> Class {
    let mut decl = ClassDecl::new("BenchConstant", Class::get("NSObject").unwrap()).unwrap();
    decl.add_method(sel!(constant), constant as extern "C" fn(Id, Sel) -> i64)
        .unwrap();
    decl.register().unwrap()
}

fn bench_nil_send(c: &mut Criterion) {
    let nil = Id::NIL;
    c.bench_function("dispatch_nil", |b| {
        b.iter(|| {
            let rect: Rect = unsafe { msg_send![black_box(nil), frame] };
            black_box(rect)
        })
    });
}

fn bench_instance_send(c: &mut Criterion) {
    let view: Id = unsafe { msg_send![Class::get("NSView").unwrap(), new] };

    c.bench_function("dispatch_instance_bool", |b| {
        b.iter(|| {
            let flag: Bool = unsafe { msg_send![black_box(view), wantsLayer] };
            black_box(flag)
        })
    });

    c.bench_function("dispatch_instance_rect", |b| {
        b.iter(|| {
            let rect: Rect = unsafe { msg_send![black_box(view), frame] };
            black_box(rect)
        })
    });
}

fn bench_class_send(c: &mut Criterion) {
    let object = Class::get("NSObject").unwrap();
    c.bench_function("dispatch_class", |b| {
        b.iter(|| {
            let class: Option<Class> = unsafe { msg_send![black_box(object), class] };
            black_box(class)
        })
    });
}

fn bench_declared_send(c: &mut Criterion) {
    let obj: Id = unsafe { msg_send![declared_class(), new] };
    c.bench_function("dispatch_declared_method", |b| {
        b.iter(|| {
            let value: i64 = unsafe { msg_send![black_box(obj), constant] };
            black_box(value)
        })
    });
}

criterion_group!(
    benches,
    bench_nil_send,
    bench_instance_send,
    bench_class_send,
    bench_declared_send,
);
criterion_main!(benches);
