//! Synthetic Feature Sample Generator
//!
//! Prints feature samples as JSON lines for exercising the classifier:
//!
//! `sample-features [count] [slouch_rate] [missing_rate] [seed] | spine-anfis`

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spine_anfis::{models::FEATURE_COUNT, FeatureSample};
use std::io::{self, BufWriter, Write};
use tracing::info;

/// Sample generator for testing
struct SampleGenerator {
    rng: StdRng,
    sample_counter: u64,
}

impl SampleGenerator {
    fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            sample_counter: 0,
        }
    }

    fn next_id(&mut self) -> String {
        self.sample_counter += 1;
        format!("sample_{:08}", self.sample_counter)
    }

    /// Angles (degrees) of a roughly neutral spine
    fn generate_upright(&mut self) -> FeatureSample {
        let features = [
            self.rng.gen_range(8.0..20.0),   // ccx
            self.rng.gen_range(25.0..38.0),  // tcx
            self.rng.gen_range(-3.0..3.0),   // tcz
            self.rng.gen_range(-25.0..-12.0), // lcx
            self.rng.gen_range(-3.0..3.0),   // lcz
            self.rng.gen_range(15.0..30.0),  // scx
        ];
        FeatureSample::new(self.next_id(), features)
    }

    /// Exaggerated thoracic and cervical curvature, lateral lean
    fn generate_slouched(&mut self) -> FeatureSample {
        let features = [
            self.rng.gen_range(25.0..45.0),
            self.rng.gen_range(45.0..65.0),
            self.rng.gen_range(-12.0..12.0),
            self.rng.gen_range(-8.0..5.0),
            self.rng.gen_range(-10.0..10.0),
            self.rng.gen_range(5.0..15.0),
        ];
        FeatureSample::new(self.next_id(), features)
    }

    /// Drop one reading, as an offline sensor would
    fn drop_feature(&mut self, sample: &mut FeatureSample) {
        let idx = self.rng.gen_range(0..FEATURE_COUNT);
        sample.features[idx] = f32::NAN;
    }
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout can be piped into the classifier
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_features=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let count: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100);
    let slouch_rate: f64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(0.3);
    let missing_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.0);
    let seed: Option<u64> = args.get(4).and_then(|s| s.parse().ok());

    info!(
        count = count,
        slouch_rate = slouch_rate,
        missing_rate = missing_rate,
        seed = ?seed,
        "Generating feature samples"
    );

    let mut generator = SampleGenerator::new(seed);
    let mut out = BufWriter::new(io::stdout().lock());

    let mut upright_count = 0;
    let mut slouched_count = 0;
    let mut missing_count = 0;

    for _ in 0..count {
        let mut sample = if generator.rng.gen_bool(slouch_rate.clamp(0.0, 1.0)) {
            slouched_count += 1;
            generator.generate_slouched()
        } else {
            upright_count += 1;
            generator.generate_upright()
        };

        if generator.rng.gen_bool(missing_rate.clamp(0.0, 1.0)) {
            missing_count += 1;
            generator.drop_feature(&mut sample);
        }

        serde_json::to_writer(&mut out, &sample)?;
        out.write_all(b"\n")?;
    }

    out.flush()?;

    info!(
        "Completed! Generated {} samples ({} upright, {} slouched, {} with missing features)",
        count, upright_count, slouched_count, missing_count
    );

    Ok(())
}
