/*!
Machine facade: owns the CPU and bus, drives the per-frame burst loop, and
composites the LCD into a host-visible pixel buffer.

Frame structure:
- Each frame runs the CPU three times against the burst budget, raising an
  IRQ after the first and second bursts and rotating the budget through the
  32768 / 7364 / 25404 cycle pattern the stock firmware is timed against.
- After the bursts the LCD composites into the 160x150 packed-pixel buffer
  using the active palette.
- A paused machine skips the CPU but still composites, so the display stays
  live while the host sits in a menu.

The pixel buffer and all device memory are allocated once in `new`; nothing
allocates after reset.
*/

use crate::bus::Bus;
use crate::cartridge::{Bios, Cartridge};
use crate::cpu65c02::{Cpu65c02, Interrupt};
use crate::lcd::{HEIGHT, WIDTH};
use crate::palette::{GREEN, Palette};

// Cycle budgets for the three CPU bursts of one frame.
const FRAME_PERIOD: i32 = 32768;
const SPLIT_PERIOD: i32 = 7364;

/// Outcome of `run_frame`: a completed frame, or the cooperative quit the
/// host requested.
pub enum FrameResult<'a> {
    Presented(&'a [u32]),
    Quit,
}

pub struct Machine {
    pub cpu: Cpu65c02,
    pub bus: Bus,

    palette: Palette,
    frame: Vec<u32>,

    paused: bool,
    quit: bool,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self {
            cpu: Cpu65c02::new(),
            bus: Bus::new(),
            palette: GREEN,
            frame: vec![0; WIDTH * HEIGHT],
            paused: true,
            quit: false,
        }
    }

    // -----------------------------
    // Image installation
    // -----------------------------

    /// Install a cartridge image (raw bytes, up to 512 KiB). On failure the
    /// machine keeps its previous cartridge.
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), String> {
        let cart = Cartridge::from_bytes(data)?;
        self.bus.insert_cartridge(cart);
        Ok(())
    }

    /// Install a BIOS image (raw bytes, up to 4 KiB; shorter images are
    /// zero-padded). On failure the machine keeps its previous BIOS.
    pub fn load_bios(&mut self, data: &[u8]) -> Result<(), String> {
        let bios = Bios::from_bytes(data)?;
        self.bus.install_bios(&bios);
        Ok(())
    }

    // -----------------------------
    // Control
    // -----------------------------

    /// Full reset: bus (RAM, banks, protection, buttons, LCD) and CPU
    /// (registers, vector fetch, budget).
    pub fn reset(&mut self, paused: bool) {
        self.bus.reset();
        self.cpu.set_period(FRAME_PERIOD);
        self.cpu.reset(&mut self.bus);
        self.paused = paused;
        self.quit = false;
    }

    /// Replace the button lines with an active-low bitmap: bit 0 up, 1 down,
    /// 2 left, 3 right, 4 A, 5 B, 6 start, 7 select; idle is 0xFF.
    pub fn set_buttons(&mut self, mask: u8) {
        self.bus.controller.set_lines(mask);
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Ask the machine to stop: the next `run_frame` returns `Quit`.
    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    pub fn set_audio_sink(&mut self, sink: Box<dyn crate::audio::AudioSink>) {
        self.bus.set_audio_sink(sink);
    }

    // -----------------------------
    // Frame loop
    // -----------------------------

    /// Advance the simulation by one frame of CPU bursts and composite the
    /// LCD. Returns the pixel buffer, or `Quit` after `request_quit`.
    pub fn run_frame(&mut self) -> FrameResult<'_> {
        if self.quit {
            return FrameResult::Quit;
        }

        if !self.paused {
            self.cpu.run(&mut self.bus, || Interrupt::Quit);
            self.cpu.interrupt(&mut self.bus, Interrupt::Irq);
            self.cpu.set_period(FRAME_PERIOD);
            self.cpu.run(&mut self.bus, || Interrupt::Quit);
            self.cpu.interrupt(&mut self.bus, Interrupt::Irq);
            self.cpu.set_period(SPLIT_PERIOD);
            self.cpu.run(&mut self.bus, || Interrupt::Quit);
            self.cpu.set_period(FRAME_PERIOD - SPLIT_PERIOD);
        }

        self.bus.lcd.render(&self.palette, &mut self.frame);
        FrameResult::Presented(&self.frame)
    }

    /// The most recently composited frame (`WIDTH * HEIGHT` packed pixels).
    pub fn framebuffer(&self) -> &[u32] {
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioSink;
    use crate::test_utils::build_bios_with_program;
    use std::cell::RefCell;
    use std::rc::Rc;

    // A program that counts frames into $10 and spins: the reset handler
    // increments, then parks in a tight loop at $E002.
    const COUNT_AND_SPIN: &[u8] = &[
        0xE6, 0x10, // INC $10
        0x4C, 0x02, 0xE0, // JMP $E002
    ];

    fn machine_with_program(program: &[u8]) -> Machine {
        let mut m = Machine::new();
        m.load_bios(&build_bios_with_program(program, 0xE000))
            .expect("bios");
        m.reset(false);
        m
    }

    #[test]
    fn reset_loads_the_reset_vector() {
        let mut m = Machine::new();
        let mut image = vec![0xEAu8; 4096];
        image[0xFFC] = 0x34;
        image[0xFFD] = 0x12;
        m.load_bios(&image).expect("bios");

        m.reset(true);
        assert_eq!(m.cpu.pc, 0x1234);
        assert!(m.is_paused());
    }

    #[test]
    fn reset_is_idempotent() {
        let mut m = machine_with_program(COUNT_AND_SPIN);

        m.reset(false);
        let first = (
            m.cpu.pc,
            m.cpu.sp,
            m.cpu.status,
            m.bus.protection_remaining(),
            m.bus.bank0_offset(),
            m.bus.bank1_offset(),
            m.bus.read(0x0010),
        );

        m.reset(false);
        let second = (
            m.cpu.pc,
            m.cpu.sp,
            m.cpu.status,
            m.bus.protection_remaining(),
            m.bus.bank0_offset(),
            m.bus.bank1_offset(),
            m.bus.read(0x0010),
        );

        assert_eq!(first, second);
    }

    #[test]
    fn reset_restores_ram_after_execution() {
        let mut m = machine_with_program(COUNT_AND_SPIN);
        m.run_frame();
        assert_ne!(m.bus.read(0x0010), 0xFF);

        m.reset(false);
        assert_eq!(m.bus.read(0x0010), 0xFF);
    }

    #[test]
    fn run_frame_executes_cpu_bursts() {
        let mut m = machine_with_program(COUNT_AND_SPIN);

        m.run_frame();

        // The reset path increments once (from the $FF power-on pattern to
        // $00); the first mid-frame IRQ re-enters the handler for a second
        // increment, and the second IRQ stays masked behind the I flag the
        // first one set.
        assert_eq!(m.bus.read(0x0010), 0x01);
        assert!(m.cpu.pc >= 0xE002 && m.cpu.pc <= 0xE004);
    }

    #[test]
    fn blanked_frame_is_all_palette_zero() {
        let mut m = machine_with_program(COUNT_AND_SPIN);
        let background = m.palette()[0];

        match m.run_frame() {
            FrameResult::Presented(pixels) => {
                assert_eq!(pixels.len(), WIDTH * HEIGHT);
                assert!(pixels.iter().all(|&px| px == background));
            }
            FrameResult::Quit => panic!("frame expected"),
        }
    }

    #[test]
    fn paused_machine_skips_the_cpu_but_still_presents() {
        let mut m = machine_with_program(COUNT_AND_SPIN);
        m.set_paused(true);
        let pc = m.cpu.pc;

        match m.run_frame() {
            FrameResult::Presented(pixels) => assert_eq!(pixels.len(), WIDTH * HEIGHT),
            FrameResult::Quit => panic!("frame expected"),
        }
        assert_eq!(m.cpu.pc, pc);
        assert_eq!(m.bus.read(0x0010), 0xFF); // counter untouched
    }

    #[test]
    fn request_quit_ends_the_frame_loop() {
        let mut m = machine_with_program(COUNT_AND_SPIN);
        m.request_quit();
        assert!(matches!(m.run_frame(), FrameResult::Quit));
    }

    #[test]
    fn buttons_reach_the_input_window() {
        let mut m = machine_with_program(COUNT_AND_SPIN);
        assert_eq!(m.bus.read(0x4400), 0xFF);

        m.set_buttons(0xEF); // A held
        assert_eq!(m.bus.read(0x4400), 0xEF);

        m.set_buttons(0xFF);
        assert_eq!(m.bus.read(0x4400), 0xFF);
    }

    struct Probe(Rc<RefCell<Vec<(u8, u8)>>>);

    impl AudioSink for Probe {
        fn write_reg(&mut self, reg: u8, value: u8) {
            self.0.borrow_mut().push((reg, value));
        }
    }

    #[test]
    fn audio_writes_reach_the_host_sink() {
        // LDA #$42; STA $4007; spin.
        let program = &[0xA9, 0x42, 0x8D, 0x07, 0x40, 0x4C, 0x05, 0xE0];
        let mut m = machine_with_program(program);
        let log = Rc::new(RefCell::new(Vec::new()));
        m.set_audio_sink(Box::new(Probe(log.clone())));

        m.run_frame();

        assert_eq!(log.borrow().first(), Some(&(0x07, 0x42)));
    }

    #[test]
    fn set_palette_changes_the_composited_colors() {
        let mut m = machine_with_program(COUNT_AND_SPIN);
        let palette = [0x0101_0101, 0x0202_0202, 0x0303_0303, 0x0404_0404];
        m.set_palette(palette);

        match m.run_frame() {
            FrameResult::Presented(pixels) => {
                assert!(pixels.iter().all(|&px| px == 0x0101_0101));
            }
            FrameResult::Quit => panic!("frame expected"),
        }
    }
}
