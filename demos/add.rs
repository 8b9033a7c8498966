use std::error::Error;
use tensor_add::{
    backend::{Backend, set_backend},
    kernel::Dispatch,
    ops::dispatch,
    shape::Shape,
    tensors::Tensor,
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // a residual connection: 2 sequences of 3 tokens with 6 channels each
    let shape = Shape::new(6, 3, 2);
    let x: Vec<f32> = (0..shape.len()).map(|i| i as f32).collect();
    let x = Tensor::new(shape, &x);
    let mut residual = Tensor::new(shape, &vec![100.0; shape.len()]);

    if cfg!(feature = "wgpu") {
        set_backend(Backend::Wgpu);
    }

    println!("shape {shape}, stride {}, grid {}", shape.stride(), Dispatch::for_shape(shape)?);
    let used = dispatch::add(&x, &mut residual)?;
    println!("ran on {used}");

    for b in 0..shape.b {
        for t in 0..shape.t {
            let row: Vec<f32> = (0..shape.c)
                .filter_map(|c| residual.get(b, t, c))
                .collect();
            println!("b={b} t={t}: {row:?}");
        }
    }

    Ok(())
}
