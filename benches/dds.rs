use criterion::{criterion_group, criterion_main, Criterion};
use newton_dds::{errors::DDSError, grid::{Grid, GridOptions}, tree::MultiIndexTree};

fn build_four_d_grid() -> Result<(Grid, Vec<f64>), DDSError>
{
    // Euclidean degree-8 set in four dimensions
    let grid = Grid::from_options(&GridOptions { spatial_dimension: 4, poly_degree: 8, lp_degree: 2.0, ..Default::default() })?;

    let f = |x: &[f64]|
    {
        let mut r = 0.0;
        for xi in x
        {
            r += xi * xi * xi;
        }
        r
    };
    let values = grid.unisolvent_nodes().chunks_exact(grid.ndim()).map(f).collect();
    Ok((grid, values))
}

fn run_four_d(c: &mut Criterion)
{
    let (grid, values) = build_four_d_grid().unwrap();
    c.bench_function("4d dds", |b| b.iter(|| grid.dds(&values, 1).unwrap()));
    c.bench_function("4d tree build", |b| b.iter(|| MultiIndexTree::new(grid.multi_index())));
}

criterion_group!(benches, run_four_d);
criterion_main!(benches);
