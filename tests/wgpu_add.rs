#![cfg(feature = "wgpu")]

use rand::{Rng, SeedableRng, rngs::StdRng};
use tensor_add::approx::approx_eq;
use tensor_add::kernel::Dispatch;
use tensor_add::ops::cpu;
use tensor_add::ops::wgpu::{
    AddKernel, AddOp, GpuContext, GpuTensor, context, kernel, submit_add, wgpu_add,
};
use tensor_add::shape::Shape;
use tensor_add::tensors::Tensor;

/// The shared context, or `None` on machines without an adapter.
fn gpu() -> Option<(&'static GpuContext, &'static AddKernel)> {
    Some((context().ok()?, kernel().ok()?))
}

fn random_tensor(rng: &mut StdRng, shape: Shape) -> Tensor {
    let data: Vec<f32> = (0..shape.len())
        .map(|_| rng.random_range(-1.0f32..1.0))
        .collect();
    Tensor::new(shape, &data)
}

fn bits(values: &[f32]) -> Vec<u32> {
    values.iter().map(|v| v.to_bits()).collect()
}

#[test]
fn gpu_matches_single_threaded_reference() {
    if gpu().is_none() {
        return;
    }

    let mut rng = StdRng::seed_from_u64(16);
    let shape = Shape::new(128, 16, 2);
    let x = random_tensor(&mut rng, shape);
    let out = random_tensor(&mut rng, shape);

    let mut on_gpu = out.clone();
    let mut reference = out;
    wgpu_add(&x, &mut on_gpu).unwrap();
    cpu::reference_add(&x, &mut reference).unwrap();

    assert_eq!(bits(on_gpu.padded()), bits(reference.padded()));
}

#[test]
fn gpu_single_vector_channel() {
    if gpu().is_none() {
        return;
    }

    let shape = Shape::new(4, 1, 1);
    let x = Tensor::new(shape, &[1.0, 2.0, 3.0, 4.0]);
    let mut out = Tensor::new(shape, &[4.0, 3.0, 2.0, 1.0]);

    wgpu_add(&x, &mut out).unwrap();

    assert_eq!(out.padded(), &[5.0, 5.0, 5.0, 5.0]);
}

#[test]
fn gpu_padding_lanes_are_added() {
    if gpu().is_none() {
        return;
    }

    let shape = Shape::new(6, 2, 1);
    let x = Tensor::new(shape, &[0.25; 12]);
    let mut out = Tensor::new(shape, &[1.0; 12]);
    wgpu_add(&x, &mut out).unwrap();
    assert_eq!(out.to_vec(), vec![1.25; 12]);
    for row in out.padded().chunks_exact(8) {
        assert_eq!(&row[6..], &[0.0, 0.0]);
    }

    let x = Tensor::from_padded(Shape::new(6, 1, 1), vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 3.0])
        .unwrap();
    let mut out = Tensor::from_padded(Shape::new(6, 1, 1), vec![0.0; 8]).unwrap();
    wgpu_add(&x, &mut out).unwrap();
    assert_eq!(out.padded(), &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 3.0]);
}

#[test]
fn gpu_repeated_dispatch_accumulates() {
    let Some((ctx, kernel)) = gpu() else {
        return;
    };

    let shape = Shape::new(12, 5, 3);
    let mut rng = StdRng::seed_from_u64(17);
    let x = random_tensor(&mut rng, shape);
    let out = random_tensor(&mut rng, shape);

    let input = GpuTensor::from_tensor(ctx, &x).unwrap();
    let sum = GpuTensor::from_tensor(ctx, &out).unwrap();
    let op = AddOp::new(ctx, kernel, &input, &sum).unwrap();
    submit_add(ctx, core::slice::from_ref(&op)).unwrap();
    submit_add(ctx, core::slice::from_ref(&op)).unwrap();

    let mut once = out;
    cpu::reference_add(&x, &mut once).unwrap();
    let mut twice = once.clone();
    cpu::reference_add(&x, &mut twice).unwrap();

    let result = sum.read_back(ctx).unwrap();
    assert!(approx_eq(&result.to_vec()[..], &twice.to_vec()[..]));
    assert_ne!(result, once);
}

#[test]
fn gpu_over_provisioned_grid() {
    let Some((ctx, kernel)) = gpu() else {
        return;
    };

    let mut rng = StdRng::seed_from_u64(18);
    let shape = Shape::new(20, 3, 2);
    let x = random_tensor(&mut rng, shape);
    let out = random_tensor(&mut rng, shape);

    let input = GpuTensor::from_tensor(ctx, &x).unwrap();
    let sum = GpuTensor::from_tensor(ctx, &out).unwrap();
    let op = AddOp::new(ctx, kernel, &input, &sum)
        .unwrap()
        .with_dispatch(Dispatch::new(4, 5, 3))
        .unwrap();
    submit_add(ctx, core::slice::from_ref(&op)).unwrap();

    let mut expected = out;
    cpu::add(&x, &mut expected).unwrap();

    assert_eq!(bits(sum.read_back(ctx).unwrap().padded()), bits(expected.padded()));
}

#[test]
fn gpu_several_ops_in_one_pass() {
    let Some((ctx, kernel)) = gpu() else {
        return;
    };

    let shape = Shape::new(8, 2, 2);
    let a = GpuTensor::from_tensor(ctx, &Tensor::new(shape, &[1.0; 32])).unwrap();
    let b = GpuTensor::from_tensor(ctx, &Tensor::new(shape, &[2.0; 32])).unwrap();
    let sum = GpuTensor::zeros(ctx, shape).unwrap();

    let ops = [
        AddOp::new(ctx, kernel, &a, &sum).unwrap(),
        AddOp::new(ctx, kernel, &b, &sum).unwrap(),
    ];
    submit_add(ctx, &ops).unwrap();

    assert_eq!(sum.read_back(ctx).unwrap().to_vec(), vec![3.0; 32]);
}
