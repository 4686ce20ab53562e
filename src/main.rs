use std::fs;
use std::sync::mpsc;

mod monitor;

use chrono::Duration;
use log::{info, trace};
use rpsx::config::Config;
use rpsx::System;
use timer::Timer;

/// Ticks per frame at the reference master clock, matching §5's "`master_clock / 60`".
const MASTER_CLOCK_HZ: u64 = 33_868_800;
const TICKS_PER_FRAME: u64 = MASTER_CLOCK_HZ / 60;

fn main() {
    env_logger::init();

    let config = match Config::from_args() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
    };

    let bios = fs::read(&config.bios_path).expect("BIOS image does not exist");
    let mut system = System::new(bios).expect("invalid BIOS image");

    if let Some(cd_path) = &config.cd_image_path {
        let disc = fs::read(cd_path).expect("CD image does not exist");
        system.set_cdrom(Some(Box::new(move |offset, dest| {
            let offset = offset as usize;
            let end = (offset + dest.len()).min(disc.len());
            if offset < end {
                let available = end - offset;
                dest[..available].copy_from_slice(&disc[offset..end]);
                dest[available..].iter_mut().for_each(|b| *b = 0);
            } else {
                dest.iter_mut().for_each(|b| *b = 0);
            }
        })));
        info!("attached disc image {}", cd_path);
    }

    let mut presenter = if config.headless {
        None
    } else {
        let (width, height) = system.vram_dimensions();
        Some(monitor::Monitor::new(width, height))
    };

    // A background heartbeat thread paces frames at ~60 Hz; `System` itself
    // is not `Send` (it owns `Rc<RefCell<Bus>>`), so only the tick signal
    // crosses the thread boundary, and every `step()` call stays on `main`.
    let (tx, rx) = mpsc::channel();
    let _timer = Timer::new();
    let _guard = _timer.schedule_repeating(Duration::milliseconds(1000 / 60), move || {
        let _ = tx.send(());
    });

    loop {
        if rx.recv().is_err() {
            break;
        }

        for _ in 0..TICKS_PER_FRAME {
            system.step();
            if let Some(fault) = system.take_bus_fault() {
                panic!("bus fault: {}", fault);
            }
            maybe_log_tty_output(&system);
        }
        system.vblank();

        if let Some(presenter) = presenter.as_mut() {
            if !presenter.is_open() {
                break;
            }
            presenter.present(&system.vram());
        }
    }
}

/// Host-side convenience described in SPEC_FULL.md §6: sniffs the
/// conventional BIOS TTY-output call sites without the core itself
/// interpreting them.
fn maybe_log_tty_output(system: &System) {
    let pc = system.pc();
    let is_tty_call = (pc == 0x0000_00A0 && system.gpr(9) == 0x3C)
        || (pc == 0x0000_00B0 && system.gpr(9) == 0x3D);
    if is_tty_call {
        let ch = system.gpr(4) as u8 as char;
        trace!(target: "rpsx::tty", "{}", ch);
    }
}
