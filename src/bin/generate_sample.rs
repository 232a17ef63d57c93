use std::path::PathBuf;

use anyhow::{Context, Result};

use gaze_trace::data::writer::save_file;
use gaze_trace::logger::{GAZE_COLUMNS, NO_HIT};
use gaze_trace::{Dataset, LogFormat, Point3, Value};

/// Objects the simulated participant looks at: name, centre, spread.
const TARGETS: [(&str, [f64; 3], f64); 4] = [
    ("Painting", [2.0, 1.6, 4.0], 0.02),
    ("Door", [-1.5, 1.1, 3.0], 0.03),
    ("Table", [0.5, 0.8, 1.5], 0.04),
    ("Window", [3.5, 1.8, 0.5], 0.02),
];

const SAMPLE_RATE_HZ: f64 = 30.0;
const DWELL_SAMPLES: usize = 90;
const VISITS: usize = 12;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> Result<()> {
    let output_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_session.csv"));
    let mut rng = SimpleRng::new(42);

    let columns: Vec<String> = ["timestamp", "xpos", "ypos", "zpos", "upos", "vpos", "wpos"]
        .iter()
        .chain(GAZE_COLUMNS.iter())
        .map(|c| c.to_string())
        .collect();

    let mut rows = Vec::with_capacity(VISITS * DWELL_SAMPLES);
    let mut head = Point3::new(0.0, 1.7, 0.0);
    for visit in 0..VISITS {
        let (name, centre, spread) = TARGETS[(rng.next_u64() % TARGETS.len() as u64) as usize];
        let centre = Point3::new(centre[0], centre[1], centre[2]);
        for i in 0..DWELL_SAMPLES {
            let t = (visit * DWELL_SAMPLES + i) as f64 / SAMPLE_RATE_HZ;
            head.x += rng.gauss(0.0, 0.002);
            head.z += rng.gauss(0.0, 0.002);
            let yaw = (centre.x - head.x).atan2(centre.z - head.z).to_degrees();
            let pitch = -(centre.y - head.y).atan2(head.distance(&centre)).to_degrees();

            // Roughly one sample in twenty loses tracking; the logged point
            // is then wherever the ray ended up.
            let hit = rng.next_f64() > 0.05;
            let (gaze, object) = if hit {
                (
                    Point3::new(
                        rng.gauss(centre.x, spread),
                        rng.gauss(centre.y, spread),
                        rng.gauss(centre.z, spread),
                    ),
                    name,
                )
            } else {
                (
                    Point3::new(rng.gauss(0.0, 5.0), rng.gauss(1.0, 2.0), rng.gauss(0.0, 5.0)),
                    NO_HIT,
                )
            };
            rows.push(vec![
                Value::Float(t),
                Value::Float(head.x),
                Value::Float(head.y),
                Value::Float(head.z),
                Value::Float(pitch),
                Value::Float(yaw),
                Value::Float(0.0),
                Value::Float(gaze.x),
                Value::Float(gaze.y),
                Value::Float(gaze.z),
                Value::Text(object.to_string()),
            ]);
        }
    }

    let dataset = Dataset::from_rows(columns, rows);
    save_file(&output_path, &dataset, &[], &LogFormat::csv())
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    println!(
        "Wrote {} gaze samples ({} visits) to {}",
        dataset.len(),
        VISITS,
        output_path.display()
    );
    Ok(())
}
