use std::cell::RefCell;

use lr35902_common::error::Error;

use crate::{
    data::BootRom,
    gb::{GameBoy, GameBoyMode},
    ppu::FRAME_BUFFER_SIZE,
};

thread_local! {
    /// Accumulates bytes the serial port pushes out, since the port's
    /// callback is a plain `fn` pointer and can't capture a buffer of
    /// its own. Each test runs on its own thread, so this is naturally
    /// scoped per test.
    static SERIAL_OUTPUT: RefCell<String> = const { RefCell::new(String::new()) };
}

fn record_serial_push(byte: u8) {
    SERIAL_OUTPUT.with(|buf| buf.borrow_mut().push(byte as char));
}

#[derive(Default)]
pub struct TestOptions {
    pub mode: Option<GameBoyMode>,
    pub ppu_enabled: Option<bool>,
    pub apu_enabled: Option<bool>,
    pub dma_enabled: Option<bool>,
    pub timer_enabled: Option<bool>,
    pub boot_rom: Option<BootRom>,
}

pub fn build_test(options: TestOptions) -> Box<GameBoy> {
    SERIAL_OUTPUT.with(|buf| buf.borrow_mut().clear());

    let mut game_boy = Box::new(GameBoy::new(options.mode));
    game_boy.set_ppu_enabled(options.ppu_enabled.unwrap_or(true));
    game_boy.set_apu_enabled(options.apu_enabled.unwrap_or(true));
    game_boy.set_dma_enabled(options.dma_enabled.unwrap_or(true));
    game_boy.set_timer_enabled(options.timer_enabled.unwrap_or(true));
    game_boy.set_serial_push_callback(record_serial_push);
    game_boy.load(false).unwrap();
    game_boy.load_boot_smart(options.boot_rom).unwrap();
    game_boy
}

pub fn run_test(
    rom_path: &str,
    max_cycles: Option<u64>,
    options: TestOptions,
) -> Result<Box<GameBoy>, Error> {
    let max_cycles = max_cycles.unwrap_or(u64::MAX);
    let mut game_boy = build_test(options);
    game_boy.load_rom_file(rom_path, None)?;
    game_boy.clocks_cycles(max_cycles as usize);
    Ok(game_boy)
}

pub fn run_step_test(
    rom_path: &str,
    addr: u16,
    options: TestOptions,
) -> Result<Box<GameBoy>, Error> {
    let mut game_boy = build_test(options);
    game_boy.load_rom_file(rom_path, None)?;
    game_boy.step_to(addr);
    Ok(game_boy)
}

pub fn run_serial_test(
    rom_path: &str,
    max_cycles: Option<u64>,
    options: TestOptions,
) -> Result<(String, Box<GameBoy>), Error> {
    let game_boy = run_test(rom_path, max_cycles, options)?;
    let output = SERIAL_OUTPUT.with(|buf| buf.borrow().clone());
    Ok((output, game_boy))
}

pub fn run_image_test(
    rom_path: &str,
    max_cycles: Option<u64>,
    options: TestOptions,
) -> Result<([u8; FRAME_BUFFER_SIZE], Box<GameBoy>), Error> {
    let mut game_boy = run_test(rom_path, max_cycles, options)?;
    Ok((*game_boy.frame_buffer(), game_boy))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use crate::{
        consts::{
            BGP_ADDR, DIV_ADDR, DMA_ADDR, IF_ADDR, LCDC_ADDR, LYC_ADDR, LY_ADDR, OBP0_ADDR,
            OBP1_ADDR, SCX_ADDR, SCY_ADDR, STAT_ADDR, TAC_ADDR, TIMA_ADDR, TMA_ADDR, WX_ADDR,
            WY_ADDR,
        },
        data::BootRom,
        gb::GameBoyMode,
        licensee::Licensee,
        rom::{Cartridge, RamSize, Region, RomSize},
    };

    use super::{build_test, run_serial_test, run_step_test, TestOptions};

    #[test]
    fn test_boot_state() {
        let mut result = run_step_test(
            "res/roms/test/blargg/cpu/cpu_instrs.gb",
            0x0100,
            TestOptions {
                boot_rom: Some(BootRom::Dmg),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(result.cpu_i().pc(), 0x0100);
        assert_eq!(result.cpu_i().sp(), 0xfffe);
        assert_eq!(result.cpu_i().af(), 0x01b0);
        assert_eq!(result.cpu_i().bc(), 0x0013);
        assert_eq!(result.cpu_i().de(), 0x00d8);
        assert_eq!(result.cpu_i().hl(), 0x014d);
        assert!(!result.cpu_i().ime());

        assert_eq!(result.mmu().read(DIV_ADDR), 0xcf);
        assert_eq!(result.mmu().read(TIMA_ADDR), 0x00);
        assert_eq!(result.mmu().read(TMA_ADDR), 0x00);
        assert_eq!(result.mmu().read(TAC_ADDR), 0xf8);
        assert_eq!(result.mmu().read(IF_ADDR), 0xe1);

        assert_eq!(result.ppu().read(LCDC_ADDR), 0x91);
        assert_eq!(result.ppu().read(STAT_ADDR), 0x81);
        assert_eq!(result.ppu().read(SCY_ADDR), 0x00);
        assert_eq!(result.ppu().read(SCX_ADDR), 0x00);
        assert_eq!(result.ppu().read(LY_ADDR), 0x99);
        assert_eq!(result.ppu().read(LYC_ADDR), 0x00);
        assert_eq!(result.ppu().read(BGP_ADDR), 0xfc);
        assert_eq!(result.ppu().read(OBP0_ADDR), 0x00);
        assert_eq!(result.ppu().read(OBP1_ADDR), 0x00);
        assert_eq!(result.ppu().read(WX_ADDR), 0x00);
        assert_eq!(result.ppu().read(WY_ADDR), 0x00);

        assert_eq!(result.ppu().read(DMA_ADDR), 0xff);
    }

    #[test]
    fn test_blargg_cpu_instrs() {
        let (result, game_boy) = run_serial_test(
            "res/roms/test/blargg/cpu/cpu_instrs.gb",
            Some(300000000),
            TestOptions::default(),
        )
        .unwrap();
        assert_eq!(result, "cpu_instrs\n\n01:ok  02:ok  03:ok  04:ok  05:ok  06:ok  07:ok  08:ok  09:ok  10:ok  11:ok  \n\nPassed all tests\n");
        assert_eq!(game_boy.rom_i().gb_mode(), GameBoyMode::Cgb);
        assert_eq!(game_boy.rom_i().title().as_str(), "CPU_INSTRS");
        assert_eq!(game_boy.rom_i().licensee(), Licensee::Unknown);
        assert_eq!(game_boy.rom_i().region(), Region::Unknown);
        assert_eq!(game_boy.rom_i().rom_size(), RomSize::Size64K);
        assert_eq!(game_boy.rom_i().ram_size(), RamSize::NoRam);
        assert!(game_boy.rom_i().valid_checksum());
    }

    #[test]
    fn test_blargg_instr_timing() {
        let (result, game_boy) = run_serial_test(
            "res/roms/test/blargg/instr_timing/instr_timing.gb",
            Some(50000000),
            TestOptions::default(),
        )
        .unwrap();
        assert_eq!(result, "instr_timing\n\n\nPassed\n");
        assert_eq!(game_boy.rom_i().gb_mode(), GameBoyMode::Cgb);
        assert_eq!(game_boy.rom_i().title().as_str(), "INSTR_TIMING");
        assert_eq!(game_boy.rom_i().licensee(), Licensee::Unknown);
        assert_eq!(game_boy.rom_i().region(), Region::Unknown);
        assert_eq!(game_boy.rom_i().rom_size(), RomSize::Size32K);
        assert_eq!(game_boy.rom_i().ram_size(), RamSize::NoRam);
        assert!(game_boy.rom_i().valid_checksum());
    }

    thread_local! {
        static RUNNABLE_CALLS: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
        static DIRTY_CALLS: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
    }

    fn record_runnable(value: bool) {
        RUNNABLE_CALLS.with(|calls| calls.borrow_mut().push(value));
    }

    fn record_dirty(value: bool) {
        DIRTY_CALLS.with(|calls| calls.borrow_mut().push(value));
    }

    #[test]
    fn test_breakpoint_stops_emulate_frame() {
        RUNNABLE_CALLS.with(|calls| calls.borrow_mut().clear());

        let mut game_boy = run_step_test(
            "res/roms/test/blargg/cpu/cpu_instrs.gb",
            0x0100,
            TestOptions {
                boot_rom: Some(BootRom::Dmg),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(!game_boy.has_breakpoint(0x0100));
        game_boy.add_breakpoint(0x0100);
        assert!(game_boy.has_breakpoint(0x0100));

        game_boy.set_runnable_callback(record_runnable);
        assert!(game_boy.runnable());

        let cycles = game_boy.emulate_frame();

        // the breakpoint is hit on the very first instruction of the
        // frame, so no cycles should have been spent
        assert_eq!(cycles, 0);
        assert!(!game_boy.runnable());
        assert_eq!(game_boy.cpu_i().pc(), 0x0100);
        RUNNABLE_CALLS.with(|calls| assert_eq!(calls.borrow().as_slice(), &[false]));

        game_boy.remove_breakpoint(0x0100);
        assert!(!game_boy.has_breakpoint(0x0100));

        // once runnable is restored and the breakpoint cleared, the frame
        // is free to execute normally again
        game_boy.set_runnable(true);
        assert!(game_boy.emulate_frame() > 0);
    }

    #[test]
    fn test_save_dirty_round_trip() {
        DIRTY_CALLS.with(|calls| calls.borrow_mut().clear());

        let mut game_boy = build_test(TestOptions::default());

        let mut rom = Cartridge::new();
        let mut data = vec![0u8; 0x8000];
        data[0x0147] = 0x03; // MBC1 + RAM + BATTERY
        data[0x0149] = 0x02; // 8 KB RAM (1 bank)
        rom.set_data(&data).unwrap();
        game_boy.mmu().set_rom(rom);

        assert!(!game_boy.save_dirty());
        game_boy.set_save_dirty_callback(record_dirty);

        // enables cartridge RAM access before writing to it, as required
        // by the MBC1 RAM enable register
        game_boy.write_memory(0x0000, 0x0a);
        assert!(!game_boy.save_dirty());

        game_boy.write_memory(0xa000, 0x42);
        assert!(game_boy.save_dirty());
        assert_eq!(game_boy.read_memory(0xa000), 0x42);
        DIRTY_CALLS.with(|calls| assert_eq!(calls.borrow().as_slice(), &[true]));

        // further writes while already dirty must not re-fire the callback
        game_boy.write_memory(0xa001, 0x43);
        DIRTY_CALLS.with(|calls| assert_eq!(calls.borrow().as_slice(), &[true]));

        game_boy.clear_save_dirty();
        assert!(!game_boy.save_dirty());
    }
}
