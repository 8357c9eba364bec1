// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Progressive rendering against the simulated GPU.
//!
//! An input thread plays a short pan/zoom/preset session into the control
//! queue while the render loop drains it once per frame. A compositor
//! thread samples the presented layer; it shares the simulated device with
//! the render loop behind one mutex, held for a frame's recording and
//! submission. Every trace event goes to both a [`PrettyPrintSink`] and a
//! [`RecorderSink`]; the recording is exported as Chrome trace JSON at the
//! end.
//!
//! Flags:
//!
//! - `--realtime`: sleep to the frame deadline instead of running flat out.
//! - `--verbose`: print every frame, not only steps and diagnostics.
//! - `--stall`, `--jitter`, `--lost`: turn on simulator pathologies.

use std::fs::File;
use std::io::{self, BufWriter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use kurbo::Vec2;

use interlace_core::events::{ControlEvent, control_channel};
use interlace_core::layer::Extent;
use interlace_core::pacer::FramePacer;
use interlace_core::present::Presentation;
use interlace_core::renderer::{ProgressiveRenderer, RendererConfig};
use interlace_core::scheduler::StepKind;
use interlace_core::timing::Collected;
use interlace_core::trace::Tracer;

use interlace_debug::pretty::{PrettyPrintSink, format_big};
use interlace_debug::recorder::RecorderSink;
use interlace_debug::tee::Tee;
use interlace_harness::PathologyToggles;
use interlace_harness::budget::{BudgetSample, FrameBudgetTracker};
use interlace_harness::sim::{SimConfig, SimulatedBackend};

const VIEWPORT: Extent = Extent::new(640, 480);
const RESIZED: Extent = Extent::new(800, 600);
const RESIZE_AT_FRAME: u64 = 90;
const FRAME_LIMIT: u64 = 5_000;

fn input_session() -> Vec<(Duration, ControlEvent)> {
    let ms = Duration::from_millis;
    vec![
        (
            ms(150),
            ControlEvent::Navigate {
                pan: Vec2::new(40.0, -12.0),
                zoom_ticks: 0.0,
            },
        ),
        (
            ms(20),
            ControlEvent::Navigate {
                pan: Vec2::new(25.0, 0.0),
                zoom_ticks: -3.0,
            },
        ),
        (
            ms(400),
            ControlEvent::Preset(String::from(
                r#"{"iterations": 800, "gamma": 0.6, "zoom": 0.01}"#,
            )),
        ),
        (ms(300), ControlEvent::Preset(String::from("{\"x\": \"left\"}"))),
        (
            ms(250),
            ControlEvent::Navigate {
                pan: Vec2::ZERO,
                zoom_ticks: 10.0,
            },
        ),
    ]
}

/// The device plus the layer the compositor should show.
#[derive(Debug)]
struct Output {
    gpu: SimulatedBackend,
    shown: Option<Presentation>,
}

fn lock(output: &Mutex<Output>) -> MutexGuard<'_, Output> {
    output.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Snapshots the presented layer until `stop` is set. Returns
/// `(snapshots, unwritten pixels seen)`.
fn compositor(output: Arc<Mutex<Output>>, stop: Arc<AtomicBool>) -> (u64, u64) {
    let (mut snapshots, mut holes) = (0, 0);
    while !stop.load(Ordering::Relaxed) {
        {
            let out = lock(&output);
            if let Some(shown) = out.shown {
                holes += out.gpu.coverage(shown.layer).empty;
                snapshots += 1;
            }
        }
        thread::sleep(Duration::from_millis(8));
    }
    (snapshots, holes)
}

fn main() -> io::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let flag = |name: &str| args.iter().any(|a| a == name);
    let realtime = flag("--realtime");

    // -- sinks -------------------------------------------------------------
    let mut pretty = PrettyPrintSink::new(Box::new(io::stdout()));
    if !flag("--verbose") {
        pretty = pretty.quiet();
    }
    let mut sinks = Tee::new(pretty, RecorderSink::new());

    // -- device and renderer -----------------------------------------------
    let mut gpu = SimulatedBackend::new(SimConfig {
        pixels_per_second: 2.0e7,
        ..SimConfig::DEFAULT
    });
    gpu.toggles = PathologyToggles {
        gpu_stall: flag("--stall"),
        timer_jitter: flag("--jitter"),
        lost_timestamps: flag("--lost"),
    };
    let config = RendererConfig::desktop();
    let mut renderer =
        ProgressiveRenderer::new(config, VIEWPORT, &mut gpu).map_err(io::Error::other)?;
    let output = Arc::new(Mutex::new(Output { gpu, shown: None }));
    let mut pacer = FramePacer::new(FramePacer::DEFAULT_INTERVAL, config.pipeline_depth);
    let mut budget = FrameBudgetTracker::<48>::new();

    // -- input thread --------------------------------------------------------
    let (sender, receiver) = control_channel();
    let input = thread::spawn(move || {
        for (delay, event) in input_session() {
            thread::sleep(delay);
            if sender.send(event).is_err() {
                break;
            }
        }
    });

    let stop = Arc::new(AtomicBool::new(false));
    let presenter = thread::spawn({
        let (output, stop) = (Arc::clone(&output), Arc::clone(&stop));
        move || compositor(output, stop)
    });

    // -- frame loop ------------------------------------------------------------
    let started = Instant::now();
    let mut tracer = Tracer::new(&mut sinks);
    let mut converged_at = None;
    loop {
        let tick = pacer.next_tick();
        if tick.frame_index >= FRAME_LIMIT {
            break;
        }
        if realtime {
            thread::sleep(pacer.wait_time(started.elapsed()));
            let skipped = pacer.resync(started.elapsed());
            if skipped > 0 {
                println!("[pacer] skipped {skipped} deadlines");
            }
        }
        let mut out = lock(&output);
        if tick.frame_index == RESIZE_AT_FRAME {
            renderer
                .resize(RESIZED, &mut out.gpu, &mut tracer)
                .map_err(io::Error::other)?;
        }

        let report = renderer
            .frame(&mut out.gpu, tick.slot, receiver.drain(), &mut tracer)
            .map_err(io::Error::other)?;
        if let Collected::Ready(m) = report.collected {
            budget.observe(BudgetSample {
                fill_ms: m.seconds * 1e3,
                target_ms: config.fill_target * 1e3,
            });
        }
        let shown = renderer
            .select_presentation(&mut out.gpu, &mut tracer)
            .map_err(io::Error::other)?;
        out.shown = Some(shown);
        drop(out);

        if report.step.kind == StepKind::Idle {
            converged_at.get_or_insert(tick.frame_index);
            if !receiver.is_connected() && receiver.pending() == 0 {
                break;
            }
            if !realtime {
                // Nothing to render; let the input thread catch up.
                thread::sleep(Duration::from_millis(1));
            }
        } else {
            converged_at = None;
        }
    }
    drop(tracer);
    stop.store(true, Ordering::Relaxed);
    if input.join().is_err() {
        eprintln!("input thread panicked");
    }
    let (snapshots, holes) = presenter.join().unwrap_or_else(|_| {
        eprintln!("compositor thread panicked");
        (0, 0)
    });

    // -- summary ---------------------------------------------------------------
    let progress = renderer.progress_metrics();
    let report = budget.report();
    println!(
        "frames={} converged_at={converged_at:?} progress={:.1}% extent={}x{}",
        renderer.frame_index(),
        progress.progress_fraction * 100.0,
        progress.extent.width,
        progress.extent.height,
    );
    println!(
        "budget grade={} overruns={}/{} ({:.1}/1000) utilization={:.2}",
        report.grade.as_str(),
        report.overruns,
        report.total_samples,
        report.overrun_rate_per_1000,
        report.utilization,
    );
    println!("fill/target [{}]", budget.sparkline_ascii(2.0));
    println!("compositor: {snapshots} snapshots, {holes} unwritten pixels shown");
    let out = lock(&output);
    let stats = out.gpu.stats();
    println!(
        "gpu: {} fills, {} copies, {} px computed, {:.1} ms busy, {} layout violations",
        stats.fills,
        stats.copies,
        format_big(stats.computed_pixels),
        out.gpu.gpu_nanos() as f64 / 1e6,
        stats.layout_violations,
    );

    // -- export Chrome trace ---------------------------------------------------
    let path = "trace.json";
    let mut writer = BufWriter::new(File::create(path)?);
    interlace_debug::chrome::export(sinks.second.as_bytes(), pacer.interval(), &mut writer)?;
    println!("Wrote {path}");
    Ok(())
}
