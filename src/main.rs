//! rowexpr-bench - throughput benchmark for compiled row expressions

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rowexpr::{
    Block, CompilerConfig, DataType, ExpressionCompiler, FunctionRegistry, LambdaParameter,
    OperatorType, Page, PageProcessor, RowExpression, Value,
};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Compile representative expressions once and run them over a random page
/// from several threads
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Rows in the generated page
    #[arg(short, long, default_value = "100000")]
    rows: usize,

    /// Times each thread processes the page
    #[arg(short, long, default_value = "10")]
    iterations: usize,

    /// Worker threads sharing the compiled processors
    #[arg(short, long, default_value = "4")]
    threads: usize,

    /// Seed for page generation
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Fraction of generated values that are NULL
    #[arg(short, long, default_value = "0.1")]
    null_ratio: f64,

    /// Output page size (overrides ROWEXPR_MAX_BATCH_SIZE)
    #[arg(short = 'b', long)]
    batch_size: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = CompilerConfig::from_env().context("Failed to load configuration")?;
    if let Some(batch_size) = args.batch_size {
        config.max_batch_size = batch_size;
    }
    config.validate().context("Invalid configuration")?;
    debug!("Configuration: {:?}", config);

    let page = generate_page(args.rows, args.seed, args.null_ratio)?;
    info!(
        "Generated page with {} rows, {} channels (seed {}, null ratio {})",
        page.position_count(),
        page.channel_count(),
        args.seed,
        args.null_ratio
    );

    let compiler = ExpressionCompiler::new(Arc::new(FunctionRegistry::with_builtins()), config);
    let workloads = workloads()
        .into_iter()
        .map(|(name, filter, projections)| {
            let processor = compiler
                .compile_page_processor(filter.as_ref(), &projections)
                .with_context(|| format!("Failed to compile workload {}", name))?;
            Ok((name, processor))
        })
        .collect::<Result<Vec<(&'static str, PageProcessor)>>>()?;

    for (name, processor) in &workloads {
        let started = Instant::now();
        let output_rows = run_workload(processor, &page, args.threads.max(1), args.iterations)
            .with_context(|| format!("Workload {} failed", name))?;
        let elapsed = started.elapsed();
        let input_rows = page.position_count() * args.iterations * args.threads.max(1);
        let rate = input_rows as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
        println!(
            "{:<14} {:>10} rows in {:>8.2?} ({:>12.0} rows/s, {} rows out)",
            name, input_rows, elapsed, rate, output_rows
        );
    }

    Ok(())
}

/// Process the page `iterations` times on each of `threads` scoped threads,
/// all sharing the same processor. Returns the total number of output rows.
fn run_workload(
    processor: &PageProcessor,
    page: &Page,
    threads: usize,
    iterations: usize,
) -> Result<usize> {
    thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(move || -> Result<usize> {
                    let mut rows = 0;
                    for _ in 0..iterations {
                        for output in processor.process(page)? {
                            rows += output.position_count();
                        }
                    }
                    Ok(rows)
                })
            })
            .collect();

        let mut total = 0;
        for handle in handles {
            total += handle
                .join()
                .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
        }
        Ok(total)
    })
}

/// Channels: 0 id bigint, 1 score double, 2 name varchar, 3 active boolean,
/// 4 tags array(bigint)
fn generate_page(rows: usize, seed: u64, null_ratio: f64) -> Result<Page> {
    let mut rng = StdRng::seed_from_u64(seed);
    let null_ratio = null_ratio.clamp(0.0, 1.0);
    let names = ["alpha", "beta", "gamma", "delta", "epsilon"];

    let mut ids = Vec::with_capacity(rows);
    let mut scores = Vec::with_capacity(rows);
    let mut labels = Vec::with_capacity(rows);
    let mut flags = Vec::with_capacity(rows);
    let mut tags = Vec::with_capacity(rows);

    for row in 0..rows {
        ids.push(Some(Value::Bigint(row as i64)));
        scores.push(nullable(&mut rng, null_ratio, |r| {
            Value::Double(r.gen_range(0.0..100.0))
        }));
        labels.push(nullable(&mut rng, null_ratio, |r| {
            Value::varchar(names[r.gen_range(0..names.len())])
        }));
        flags.push(nullable(&mut rng, null_ratio, |r| Value::Boolean(r.gen_bool(0.5))));
        tags.push(nullable(&mut rng, null_ratio, |r| {
            let count = r.gen_range(0..5);
            Value::array((0..count).map(|_| Some(Value::Bigint(r.gen_range(0..1000)))).collect())
        }));
    }

    Page::new(vec![
        Block::new(DataType::Bigint, ids)?,
        Block::new(DataType::Double, scores)?,
        Block::new(DataType::Varchar, labels)?,
        Block::new(DataType::Boolean, flags)?,
        Block::new(DataType::array(DataType::Bigint), tags)?,
    ])
}

fn nullable<F>(rng: &mut StdRng, null_ratio: f64, generate: F) -> Option<Value>
where
    F: FnOnce(&mut StdRng) -> Value,
{
    if rng.gen_bool(null_ratio) {
        None
    } else {
        Some(generate(rng))
    }
}

type Workload = (&'static str, Option<RowExpression>, Vec<RowExpression>);

fn workloads() -> Vec<Workload> {
    let id = RowExpression::field(0, DataType::Bigint);
    let score = RowExpression::field(1, DataType::Double);
    let name = RowExpression::field(2, DataType::Varchar);
    let active = RowExpression::field(3, DataType::Boolean);
    let tags = RowExpression::field(4, DataType::array(DataType::Bigint));

    let grade = RowExpression::searched_case(
        vec![
            RowExpression::when(
                RowExpression::compare(
                    OperatorType::GreaterThanOrEqual,
                    score.clone(),
                    RowExpression::double(90.0),
                ),
                RowExpression::varchar("A"),
            ),
            RowExpression::when(
                RowExpression::compare(
                    OperatorType::GreaterThanOrEqual,
                    score.clone(),
                    RowExpression::double(50.0),
                ),
                RowExpression::varchar("B"),
            ),
        ],
        Some(RowExpression::varchar("C")),
        DataType::Varchar,
    );

    let in_list = RowExpression::in_list(
        name.clone(),
        vec![
            RowExpression::varchar("alpha"),
            RowExpression::varchar("gamma"),
            RowExpression::null(DataType::Varchar),
        ],
    );

    let coalesce = RowExpression::coalesce(vec![
        name.clone(),
        RowExpression::cast(score.clone(), DataType::Varchar),
        RowExpression::varchar("unknown"),
    ]);

    let logical = RowExpression::or(
        RowExpression::and(
            active.clone(),
            RowExpression::compare(OperatorType::LessThan, score.clone(), RowExpression::double(25.0)),
        ),
        RowExpression::is_null(name.clone()),
    );

    // transform(tags, BIND(id, (offset, x) -> x + offset))
    let shifted = RowExpression::call(
        "transform",
        vec![
            tags,
            RowExpression::bind(
                vec![id.clone()],
                RowExpression::lambda(
                    vec![
                        LambdaParameter::new("offset", DataType::Bigint),
                        LambdaParameter::new("x", DataType::Bigint),
                    ],
                    RowExpression::arithmetic(
                        OperatorType::Add,
                        RowExpression::variable("x", DataType::Bigint),
                        RowExpression::variable("offset", DataType::Bigint),
                    ),
                ),
            ),
        ],
        DataType::array(DataType::Bigint),
    );

    vec![
        ("searched_case", None, vec![id.clone(), grade]),
        ("in_list", Some(in_list), vec![id.clone(), name]),
        ("coalesce", None, vec![coalesce]),
        ("and_or", Some(logical), vec![id.clone(), score]),
        ("transform", Some(active), vec![id, shifted]),
    ]
}
