//! Plays a short phrase on each engine kind and logs the register writes.

use std::thread;
use std::time::Duration;

use sidsynth::patch::{EngineKind, Patch};
use sidsynth::registers::RegisterBlock;
use sidsynth_host::{HostConfig, PatchBank, SynthHost};
use wmidi::{Channel, MidiMessage, Note, U7};

fn note(on: bool, n: u8) -> Option<MidiMessage<'static>> {
    let note = Note::try_from(n).ok()?;
    Some(if on {
        MidiMessage::NoteOn(Channel::Ch1, note, U7::from_u8_lossy(100))
    } else {
        MidiMessage::NoteOff(Channel::Ch1, note, U7::from_u8_lossy(0))
    })
}

fn log_registers(engine: usize, regs: &RegisterBlock) {
    let hex: String = regs.as_bytes().iter().map(|b| format!("{:02x}", b)).collect();
    log::debug!("engine {}: {}", engine, hex);
}

fn main() {
    colog::init();

    let mut bank = PatchBank::new();
    for (program, kind) in EngineKind::kinds().iter().enumerate() {
        bank.insert(0, program as u8, Patch::new(*kind));
    }
    let host = match SynthHost::start(HostConfig::default(), bank, log_registers) {
        Ok(host) => host,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };

    for (program, kind) in EngineKind::kinds().iter().enumerate() {
        log::info!("playing {}", kind.to_str());
        let pc = MidiMessage::ProgramChange(Channel::Ch1, U7::from_u8_lossy(program as u8));
        let phrase = [36u8, 38, 43, 48];
        let sent = host.midi(&pc).and_then(|_| {
            for n in phrase {
                if let Some(msg) = note(true, n) {
                    host.midi(&msg)?;
                }
                thread::sleep(Duration::from_millis(150));
                if let Some(msg) = note(false, n) {
                    host.midi(&msg)?;
                }
                thread::sleep(Duration::from_millis(50));
            }
            Ok(())
        });
        if let Err(e) = sent {
            log::error!("{}", e);
            break;
        }
    }

    match host.stop() {
        Ok(stats) => {
            log::info!("missed ticks: {}", stats.missed());
            if let (Some(mean), Some(worst)) = (stats.mean(), stats.worst()) {
                log::info!("tick time: mean {:?}, worst {:?}", mean, worst);
            }
        }
        Err(e) => log::error!("{}", e),
    }
}
