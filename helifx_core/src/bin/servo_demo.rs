//! Servo motion profiler demo.
//!
//! Sweeps one axis center → max → min → center and prints the profile as it
//! settles, then shows instant mode and a manual reset.

use clap::Parser;
use helifx_common::fx::config::ServoAxisConfig;
use helifx_core::servo::ServoProfiler;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Consecutive on-target samples that count as settled.
const SETTLED_SAMPLES: u32 = 5;
const SAMPLE_PERIOD: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "servo_demo")]
#[command(version)]
#[command(about = "Exercise the servo motion profiler without hardware")]
struct Args {
    /// Input minimum [µs]
    #[arg(long, default_value_t = 1000)]
    input_min: i32,

    /// Input maximum [µs]
    #[arg(long, default_value_t = 2000)]
    input_max: i32,

    /// Output minimum [µs]
    #[arg(long, default_value_t = 800)]
    output_min: i32,

    /// Output maximum [µs]
    #[arg(long, default_value_t = 2200)]
    output_max: i32,

    /// Maximum speed [µs/s], 0 = unlimited
    #[arg(long, default_value_t = 500.0)]
    max_speed: f32,

    /// Maximum acceleration [µs/s²], 0 = unlimited
    #[arg(long, default_value_t = 2000.0)]
    max_accel: f32,

    /// Control loop rate [Hz]
    #[arg(long, default_value_t = 50)]
    update_rate: u32,
}

impl Args {
    fn axis(&self) -> ServoAxisConfig {
        ServoAxisConfig {
            input_min_us: self.input_min,
            input_max_us: self.input_max,
            output_min_us: self.output_min,
            output_max_us: self.output_max,
            max_speed_us_per_s: self.max_speed,
            max_accel_us_per_s2: self.max_accel,
            update_rate_hz: self.update_rate,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.axis();

    println!("=== Servo Motion Profiler Demo ===\n");

    let servo = match ServoProfiler::create_named("demo", config) {
        Ok(servo) => servo,
        Err(e) => {
            eprintln!("Failed to create servo: {e}");
            std::process::exit(1);
        }
    };

    println!("Servo configuration:");
    println!("  Input:  {} - {} us", config.input_min_us, config.input_max_us);
    println!("  Output: {} - {} us", config.output_min_us, config.output_max_us);
    println!("  Max speed: {:.0} us/s", config.max_speed_us_per_s);
    println!("  Max accel: {:.0} us/s²", config.max_accel_us_per_s2);
    println!("  Update rate: {} Hz\n", config.update_rate_hz);

    let sequence = [
        ("center", (config.input_min_us + config.input_max_us) / 2),
        ("maximum", config.input_max_us),
        ("minimum", config.input_min_us),
        ("center", (config.input_min_us + config.input_max_us) / 2),
    ];

    for (name, input) in sequence {
        println!("Moving to {name} ({input} us input)...");
        servo.set_input(input);

        let mut settled = 0;
        while settled < SETTLED_SAMPLES {
            let state = servo.state();
            let error = state.target_us - state.output_us;
            println!(
                "  Output: {:4} us  Target: {:4} us  Velocity: {:6.0} us/s  Error: {:4} us",
                state.output_us, state.target_us, state.velocity_us_per_s, error
            );
            settled = if error == 0 { settled + 1 } else { 0 };
            thread::sleep(SAMPLE_PERIOD);
        }

        println!("  Position reached\n");
        thread::sleep(Duration::from_secs(1));
    }

    println!("Instant position change (no limits)...");
    let instant = ServoAxisConfig {
        max_speed_us_per_s: 0.0,
        max_accel_us_per_s2: 0.0,
        ..config
    };
    if let Err(e) = servo.set_config(instant) {
        eprintln!("Failed to reconfigure servo: {e}");
        std::process::exit(1);
    }
    servo.set_input(config.input_max_us);
    thread::sleep(SAMPLE_PERIOD);
    println!(
        "  Input: {} us -> Output: {} us (instant)\n",
        config.input_max_us,
        servo.output()
    );

    println!("Manual reset...");
    servo.reset(config.output_midpoint());
    println!("  Reset to: {} us\n", servo.output());

    drop(servo);
    println!("=== Demo Complete ===");
}
