//! End-to-end tests for separable convolution chains
//!
//! Impulse responses, identity round trips, buffer recycling, the dense/cell
//! storage boundary and the propagation properties of line stages.

use proptest::prelude::*;
use separa::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn interval(min: &[i64], max: &[i64]) -> Interval {
    Interval::new(min.to_vec(), max.to_vec()).unwrap()
}

/// Single 1-valued sample at the origin.
fn dirac(n: usize) -> ImgBuffer {
    let region = Interval::from_dimensions(&vec![1; n]).unwrap();
    Img::from_vec(region, vec![1.0f64]).unwrap().into()
}

/// Outer product of the kernels, positioned at each kernel's lowest offset.
fn outer_product(kernels: &[Kernel1D]) -> Img<f64> {
    let min: Vec<i64> = kernels.iter().map(|k| k.min()).collect();
    let size: Vec<u64> = kernels.iter().map(|k| k.len() as u64).collect();
    let region = Interval::from_min_size(min.clone(), &size).unwrap();

    Img::from_fn(region, |p| {
        kernels
            .iter()
            .enumerate()
            .map(|(d, k)| k.values()[(p[d] - min[d]) as usize])
            .product()
    })
    .unwrap()
}

fn assert_impulse_response(kernels: &[Kernel1D]) {
    init_logging();
    let input = dirac(kernels.len());
    let expected = outer_product(kernels);
    let mut result: ImgBuffer = Img::<f64>::new_dense(expected.interval().clone()).unwrap().into();

    convolve(kernels, &Source::extend_zero(&input), &mut Target::new(&mut result)).unwrap();

    assert_eq!(result.interval(), expected.interval());
    assert_eq!(result.as_img::<f64>().unwrap().to_vec(), expected.to_vec());
}

fn ramp(region: Interval) -> ImgBuffer {
    Img::from_fn(region, |p| {
        p.iter()
            .enumerate()
            .map(|(d, &c)| ((c * (d as i64 + 3)) % 11) as f64)
            .sum::<f64>()
    })
    .unwrap()
    .into()
}

// ============================================================================
// Impulse responses
// ============================================================================

#[test]
fn test_1d_convolution() {
    let kernels = Kernel1D::asymmetric_per_axis(&[(vec![1.0, 2.0, 3.0, 4.0], 2)]).unwrap();
    assert_impulse_response(&kernels);
}

#[test]
fn test_2d_convolution() {
    let kernels = Kernel1D::central_asymmetric_per_axis(&[vec![1.0, 0.0, -1.0], vec![1.0, 2.0, 1.0]]).unwrap();
    assert_impulse_response(&kernels);
}

#[test]
fn test_3d_convolution() {
    let kernels = Kernel1D::asymmetric_per_axis(&[
        (vec![1.0, 6.0, 8.0, 6.0], 0),
        (vec![2.0, 7.0, -5.0], 3),
        (vec![1.0, 2.0], 4),
    ])
    .unwrap();
    assert_impulse_response(&kernels);
}

#[test]
fn test_required_source_interval_of_1d_stage() {
    let kernel = Kernel1D::asymmetric(vec![0.0; 4], 1).unwrap();
    let result = convolution_1d(kernel, 1)
        .required_source_interval(&interval(&[1, 0, 5], &[7, 10, 5]))
        .unwrap();
    assert_eq!(result, interval(&[1, -2, 5], &[7, 11, 5]));
}

// ============================================================================
// Identity and type checks
// ============================================================================

#[test]
fn test_identity_kernel_round_trip() {
    for n in 1..=3 {
        let region = Interval::from_min_size(vec![-2; n], &vec![5; n]).unwrap();
        let input = ramp(region.clone());
        let identity = vec![Kernel1D::asymmetric(vec![1.0], 0).unwrap(); n];
        let mut output: ImgBuffer = Img::<f64>::new_dense(region).unwrap().into();

        convolve(&identity, &Source::new(&input), &mut Target::new(&mut output)).unwrap();
        assert_eq!(
            output.as_img::<f64>().unwrap().to_vec(),
            input.as_img::<f64>().unwrap().to_vec(),
            "{}-D round trip",
            n
        );
    }
}

#[test]
fn test_type_mismatch() {
    let source: ImgBuffer = Img::<f32>::new_dense(Interval::from_dimensions(&[1]).unwrap())
        .unwrap()
        .into();
    let mut target: ImgBuffer = Img::<Argb>::new_dense(Interval::from_dimensions(&[1]).unwrap())
        .unwrap()
        .into();

    let result = convolution_1d(Kernel1D::symmetric(&[1.0]).unwrap(), 0)
        .process(&Source::extend_border(&source), &mut Target::new(&mut target));
    assert_eq!(
        result,
        Err(ConvolutionError::TypeMismatch {
            source_kind: ElementKind::Float32,
            target_kind: ElementKind::Argb,
        })
    );
    assert_eq!(target.get_argb(&[0]), Some(Argb::default()));
}

#[test]
fn test_chain_reports_type_mismatch() {
    let source: ImgBuffer = Img::<f64>::new_dense(Interval::from_dimensions(&[4, 4]).unwrap())
        .unwrap()
        .into();
    let mut target: ImgBuffer = Img::<Argb>::new_dense(Interval::from_dimensions(&[4, 4]).unwrap())
        .unwrap()
        .into();

    let result = gauss_convolve(&[1.0, 1.0], &Source::extend_zero(&source), &mut Target::new(&mut target));
    let error = result.unwrap_err();
    assert!(matches!(error, ConvolutionError::TypeMismatch { .. }));
    assert!(!error.is_precondition_violation());
}

#[test]
fn test_argb_uniform_color_is_preserved() {
    let region = Interval::from_dimensions(&[6, 5]).unwrap();
    let color = Argb::from_channels(255, 12, 128, 250);
    let input: ImgBuffer = Img::from_fn(region.clone(), |_| color).unwrap().into();
    let mut output: ImgBuffer = Img::<Argb>::new_dense(region).unwrap().into();

    gauss_convolve(&[1.5, 0.7], &Source::extend_border(&input), &mut Target::new(&mut output)).unwrap();
    assert!(output.as_img::<Argb>().unwrap().to_vec().iter().all(|&c| c == color));
}

// ============================================================================
// Buffer recycling
// ============================================================================

#[test]
fn test_buffer_reuse_matches_fresh_allocation() {
    init_logging();
    let region = Interval::from_dimensions(&[5, 4, 3, 6]).unwrap();
    let input = ramp(region.clone());
    let kernels = Kernel1D::asymmetric_per_axis(&[
        (vec![1.0, -2.0, 0.5], 1),
        (vec![3.0, 1.0], 0),
        (vec![0.25, 0.5, 0.25], 1),
        (vec![2.0, 0.0, 0.0, 1.0], 3),
    ])
    .unwrap();

    let run = |reuse: bool| {
        let chain = SeparableConvolution::new(kernels.clone())
            .with_buffer_reuse(reuse)
            .build()
            .unwrap();
        let mut output: ImgBuffer = Img::<f64>::new_dense(region.clone()).unwrap().into();
        let stats = chain
            .execute(&Source::extend_zero(&input), &mut Target::new(&mut output))
            .unwrap();
        (output, stats)
    };

    let (reused, reused_stats) = run(true);
    let (fresh, fresh_stats) = run(false);

    assert_eq!(reused_stats, ChainStats { allocations: 2, reused: 1 });
    assert_eq!(fresh_stats, ChainStats { allocations: 3, reused: 0 });
    assert_eq!(
        reused.as_img::<f64>().unwrap().to_vec(),
        fresh.as_img::<f64>().unwrap().to_vec()
    );
}

#[test]
fn test_worker_pool_matches_sequential() {
    let region = Interval::from_dimensions(&[20, 15, 4]).unwrap();
    let input = ramp(region.clone());
    let pool = std::sync::Arc::new(rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap());
    let kernels = Kernel1D::gauss_per_axis(&[1.0, 0.5, 2.0]).unwrap();

    let mut sequential: ImgBuffer = Img::<f64>::new_dense(region.clone()).unwrap().into();
    convolve(&kernels, &Source::extend_border(&input), &mut Target::new(&mut sequential)).unwrap();

    let mut parallel: ImgBuffer = Img::<f64>::new_dense(region).unwrap().into();
    SeparableConvolution::new(kernels)
        .with_worker_pool(pool)
        .build()
        .unwrap()
        .process(&Source::extend_border(&input), &mut Target::new(&mut parallel))
        .unwrap();

    assert_eq!(
        sequential.as_img::<f64>().unwrap().to_vec(),
        parallel.as_img::<f64>().unwrap().to_vec()
    );
}

// ============================================================================
// Storage layout and working kinds
// ============================================================================

#[test]
fn test_dense_and_cell_storage_agree() {
    init_logging();
    let target_region = Interval::from_dimensions(&[8, 8]).unwrap();
    let input = ramp(interval(&[-4, -4], &[12, 12]));
    let kernels = Kernel1D::central_asymmetric_per_axis(&[vec![1.0, 2.0, 1.0], vec![-1.0, 3.0, 1.0]]).unwrap();

    let builder = SeparableConvolution::new(kernels);
    let chain = builder.build().unwrap();
    let plan = chain.plan(ElementKind::Float64, &target_region).unwrap();
    let intermediate = &plan[1].interval;
    let elements = intermediate.num_elements() as u64;
    assert_eq!(elements, 80);

    let at_ceiling = StorageConfig::new().with_max_dense_elements(elements);
    let below_ceiling = StorageConfig::new().with_max_dense_elements(elements - 1);
    assert_eq!(
        StorageAllocator::new(at_ceiling).layout_for(intermediate, ElementKind::Float64),
        StorageLayout::Dense
    );
    assert!(matches!(
        StorageAllocator::new(below_ceiling).layout_for(intermediate, ElementKind::Float64),
        StorageLayout::Cells { .. }
    ));

    let run = |config: StorageConfig| {
        let mut output: ImgBuffer = Img::<f64>::new_dense(target_region.clone()).unwrap().into();
        builder
            .clone()
            .with_storage_config(config)
            .build()
            .unwrap()
            .process(&Source::new(&input), &mut Target::new(&mut output))
            .unwrap();
        output.as_img::<f64>().unwrap().to_vec()
    };
    assert_eq!(run(at_ceiling), run(below_ceiling));
}

#[test]
fn test_cell_target_matches_dense_target() {
    let region = Interval::from_dimensions(&[9, 7]).unwrap();
    let input = ramp(region.clone());
    let kernels = Kernel1D::gauss_per_axis(&[1.0, 1.0]).unwrap();

    let mut dense: ImgBuffer = Img::<f64>::new_dense(region.clone()).unwrap().into();
    let mut cells: ImgBuffer = Img::<f64>::new_cells(region, 4).unwrap().into();
    convolve(&kernels, &Source::extend_border(&input), &mut Target::new(&mut dense)).unwrap();
    convolve(&kernels, &Source::extend_border(&input), &mut Target::new(&mut cells)).unwrap();

    assert_eq!(
        dense.as_img::<f64>().unwrap().to_vec(),
        cells.as_img::<f64>().unwrap().to_vec()
    );
}

#[test]
fn test_float64_working_kind_for_float32_target() {
    let region = Interval::from_dimensions(&[10, 10]).unwrap();
    let input: ImgBuffer = Img::from_fn(region.clone(), |p| (p[0] * 10 + p[1]) as f32 / 7.0)
        .unwrap()
        .into();
    let kernels = Kernel1D::gauss_per_axis(&[1.3, 0.8]).unwrap();

    let widened = SeparableConvolution::new(kernels.clone())
        .with_working_kind(ElementKind::Float64)
        .build()
        .unwrap();
    let plan = widened.plan(ElementKind::Float32, &region).unwrap();
    assert_eq!(plan[1].kind, ElementKind::Float64);

    let mut narrow: ImgBuffer = Img::<f32>::new_dense(region.clone()).unwrap().into();
    widened
        .process(&Source::extend_border(&input), &mut Target::new(&mut narrow))
        .unwrap();

    let mut reference: ImgBuffer = Img::<f64>::new_dense(region.clone()).unwrap().into();
    convolve(&kernels, &Source::extend_border(&input), &mut Target::new(&mut reference)).unwrap();

    for position in region.positions() {
        let got = narrow.get_real(&position).unwrap();
        let want = reference.get_real(&position).unwrap();
        assert!((got - want).abs() < 1e-4, "at {:?}: {} vs {}", position, got, want);
    }
}

#[test]
fn test_nested_chains_compose() {
    let region = Interval::from_dimensions(&[6, 6]).unwrap();
    let input = ramp(interval(&[-3, -3], &[9, 9]));
    let kernels = Kernel1D::symmetric_per_axis(&[vec![2.0, 1.0], vec![1.0, 0.5]]).unwrap();

    let flat = convolution(&kernels).unwrap();
    let nested = StageChain::new(vec![
        Box::new(convolution(&kernels[..1]).unwrap()) as Box<dyn Stage>,
        Box::new(convolution_1d(kernels[1].clone(), 1)),
    ])
    .unwrap();
    assert_eq!(
        nested.required_source_interval(&region).unwrap(),
        flat.required_source_interval(&region).unwrap()
    );

    let mut expected: ImgBuffer = Img::<f64>::new_dense(region.clone()).unwrap().into();
    let mut actual: ImgBuffer = Img::<f64>::new_dense(region).unwrap().into();
    flat.process(&Source::new(&input), &mut Target::new(&mut expected)).unwrap();
    nested.process(&Source::new(&input), &mut Target::new(&mut actual)).unwrap();
    assert_eq!(
        expected.as_img::<f64>().unwrap().to_vec(),
        actual.as_img::<f64>().unwrap().to_vec()
    );
}

#[test]
fn test_source_must_cover_required_interval() {
    let region = Interval::from_dimensions(&[4, 4]).unwrap();
    let input = ramp(region.clone());
    let mut output: ImgBuffer = Img::<f64>::new_dense(region).unwrap().into();

    let result = gauss_convolve(&[1.0, 1.0], &Source::new(&input), &mut Target::new(&mut output));
    let error = result.unwrap_err();
    assert!(matches!(error, ConvolutionError::SourceOutOfBounds { .. }));
    assert!(error.is_precondition_violation());
}

// ============================================================================
// Propagation properties
// ============================================================================

fn kernel_strategy() -> impl Strategy<Value = Kernel1D> {
    (1usize..6, -3i64..8).prop_map(|(len, center)| Kernel1D::asymmetric(vec![1.0; len], center).unwrap())
}

fn interval_strategy() -> impl Strategy<Value = Interval> {
    (
        prop::collection::vec(-20i64..20, 3),
        prop::collection::vec(0u64..10, 3),
    )
        .prop_map(|(min, size)| {
            let size: Vec<u64> = size.into_iter().map(|s| s + 1).collect();
            Interval::from_min_size(min, &size).unwrap()
        })
}

proptest! {
    #[test]
    fn prop_required_interval_is_monotonic(
        kernel in kernel_strategy(),
        axis in 0usize..3,
        inner in interval_strategy(),
        below in prop::collection::vec(0i64..5, 3),
        above in prop::collection::vec(0i64..5, 3),
    ) {
        let outer = (0..3).try_fold(inner.clone(), |region, d| region.grow_axis(d, below[d], above[d])).unwrap();
        prop_assert!(outer.contains(&inner));

        let stage = convolution_1d(kernel, axis);
        let required_inner = stage.required_source_interval(&inner).unwrap();
        let required_outer = stage.required_source_interval(&outer).unwrap();
        prop_assert!(required_outer.contains(&required_inner));
    }

    #[test]
    fn prop_chain_propagation_is_right_fold(
        stages in prop::collection::vec((kernel_strategy(), 0usize..3), 1..5),
        target in interval_strategy(),
    ) {
        let lines: Vec<LineConvolution> = stages
            .iter()
            .map(|(kernel, axis)| convolution_1d(kernel.clone(), *axis))
            .collect();
        let chain = StageChain::new(
            lines.iter().cloned().map(|s| Box::new(s) as Box<dyn Stage>).collect(),
        )
        .unwrap();

        let folded = lines
            .iter()
            .rev()
            .try_fold(target.clone(), |region, stage| stage.required_source_interval(&region))
            .unwrap();
        prop_assert_eq!(chain.required_source_interval(&target).unwrap(), folded.clone());

        let plan = chain.plan(ElementKind::Float32, &target).unwrap();
        prop_assert_eq!(plan.len(), lines.len() + 1);
        prop_assert_eq!(&plan[0].interval, &folded);
        prop_assert_eq!(&plan[lines.len()].interval, &target);
    }
}
