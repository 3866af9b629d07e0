use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kiln_vm::object::ArrayData;
use kiln_vm::{array_copy, Value, Vm, VmOptions};

fn bench_int_arrays(c: &mut Criterion) {
    let vm = Vm::boot(VmOptions::default()).unwrap();
    let class = vm.classes().find_bootstrap("[I").unwrap();
    let mut group = c.benchmark_group("int_arrays");

    for len in [16usize, 1024, 65536] {
        let src = vm
            .heap()
            .alloc_array_with(&class, ArrayData::Int((0..len as i32).collect()))
            .unwrap();
        let dest = vm.heap().alloc_array(&class, len as i32).unwrap();
        group.throughput(Throughput::Bytes((len * 4) as u64));

        group.bench_with_input(BenchmarkId::new("distinct", len), &len, |b, &len| {
            b.iter(|| array_copy(Some(&src), 0, Some(&dest), 0, black_box(len as i32)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("overlapping", len), &len, |b, &len| {
            b.iter(|| array_copy(Some(&src), 0, Some(&src), 1, black_box(len as i32 - 1)).unwrap());
        });
    }

    group.finish();
}

fn bench_reference_arrays(c: &mut Criterion) {
    let vm = Vm::boot(VmOptions::default()).unwrap();
    let objects = vm.classes().find_bootstrap("[Ljava/lang/Object;").unwrap();
    let strings = vm.classes().find_bootstrap("[Ljava/lang/String;").unwrap();
    let mut group = c.benchmark_group("reference_arrays");

    let len = 1024;
    let src = vm.heap().alloc_array(&objects, len).unwrap();
    {
        let mut data = src.array().unwrap();
        for i in 0..len as usize {
            let s = vm.new_string(&i.to_string()).unwrap();
            data.set(i, Value::object(s));
        }
    }
    let same = vm.heap().alloc_array(&objects, len).unwrap();
    let narrower = vm.heap().alloc_array(&strings, len).unwrap();

    // Same element type takes the bulk path; a narrower destination checks
    // every element
    group.bench_function("bulk", |b| {
        b.iter(|| array_copy(Some(&src), 0, Some(&same), 0, black_box(len)).unwrap());
    });
    group.bench_function("store_checked", |b| {
        b.iter(|| array_copy(Some(&src), 0, Some(&narrower), 0, black_box(len)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_int_arrays, bench_reference_arrays);
criterion_main!(benches);
