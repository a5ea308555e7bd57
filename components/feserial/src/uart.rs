//! UART programming and polled transmit
//!
//! The line is always 115200-8N1. The transmitter is driven by polling THRE;
//! no interrupts, no DMA.

use core::hint::spin_loop;

use dddk_runtime::{DriverError, RegisterWindow, Result};
use log::{debug, warn};

use crate::config::TxWait;
use crate::regs::*;

/// Fixed line rate
pub const BAUD_RATE: u32 = 115_200;

/// Divisor latch value for `baud` given a `clock_hz` input clock
///
/// Integer division, truncating: `clock_hz / (16 * baud)`. A zero baud
/// yields a zero divisor.
pub fn baud_divisor(clock_hz: u32, baud: u32) -> u32 {
    let div = u64::from(clock_hz)
        .checked_div(16 * u64::from(baud))
        .unwrap_or(0);
    div as u32
}

/// Program divisor, line control and FIFOs
///
/// `clock_hz` of 0 (no `clock-frequency` property) produces divisor 0, which
/// is written as-is; what the controller does with it is hardware specific.
/// Returns the divisor that was computed.
pub fn configure<W: RegisterWindow + ?Sized>(regs: &mut W, clock_hz: u32) -> u32 {
    let divisor = baud_divisor(clock_hz, BAUD_RATE);
    if divisor == 0 {
        warn!("uart: clock {} Hz gives divisor 0 for {} baud", clock_hz, BAUD_RATE);
    } else if divisor > 0xffff {
        warn!("uart: divisor {:#x} does not fit the latch, truncating", divisor);
    }
    debug!("uart: clock {} Hz, divisor {}", clock_hz, divisor);

    regs.write32(MDR1_DISABLE, UART_OMAP_MDR1);

    // Clear LCR first so DLAB goes high from a known state
    regs.write32(0, UART_LCR);
    regs.write32(Lcr::DLAB.bits(), UART_LCR);
    regs.write32(divisor & 0xff, UART_DLL);
    regs.write32((divisor >> 8) & 0xff, UART_DLM);
    regs.write32(Lcr::WLEN8.bits(), UART_LCR);

    regs.write32((Fcr::CLEAR_RCVR | Fcr::CLEAR_XMIT).bits(), UART_FCR);
    regs.write32(MDR1_16X, UART_OMAP_MDR1);

    divisor
}

/// Poll register `offset` until any bit of `mask` is set
pub fn wait_for<W: RegisterWindow + ?Sized>(
    regs: &W,
    offset: usize,
    mask: u32,
    policy: TxWait,
) -> Result<()> {
    match policy {
        TxWait::Spin => {
            while regs.read32(offset) & mask == 0 {
                spin_loop();
            }
            Ok(())
        }
        TxWait::Bounded { max_polls } => {
            for _ in 0..max_polls {
                if regs.read32(offset) & mask != 0 {
                    return Ok(());
                }
                spin_loop();
            }
            Err(DriverError::Timeout { polls: max_polls })
        }
    }
}

/// Send one byte once the transmit holding register is empty
pub fn send_byte<W: RegisterWindow + ?Sized>(regs: &mut W, byte: u8, policy: TxWait) -> Result<()> {
    wait_for(regs, UART_LSR, Lsr::THRE.bits(), policy)?;
    regs.write32(u32::from(byte), UART_TX);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dddk_runtime::mock::Mock16550;

    #[test]
    fn test_baud_divisor() {
        assert_eq!(baud_divisor(1_843_200, BAUD_RATE), 1);
        assert_eq!(baud_divisor(48_000_000, BAUD_RATE), 26);
        assert_eq!(baud_divisor(0, BAUD_RATE), 0);
        assert_eq!(baud_divisor(1_843_199, BAUD_RATE), 0);
        assert_eq!(baud_divisor(u32::MAX, 1), 268_435_455);
        assert_eq!(baud_divisor(48_000_000, 0), 0);
    }

    #[test]
    fn test_configure_register_sequence() {
        let mut uart = Mock16550::new();

        let divisor = configure(&mut uart, 48_000_000);
        assert_eq!(divisor, 26);

        assert_eq!(
            uart.writes(),
            vec![
                (UART_OMAP_MDR1, 0x07),
                (UART_LCR, 0x00),
                (UART_LCR, 0x80),
                (UART_DLL, 26),
                (UART_DLM, 0),
                (UART_LCR, 0x03),
                (UART_FCR, 0x06),
                (UART_OMAP_MDR1, 0x00),
            ]
        );
        // The divisor went to the latch, not the wire
        assert!(uart.transmitted().is_empty());
    }

    #[test]
    fn test_configure_splits_divisor_bytes() {
        let mut uart = Mock16550::new();

        // 16 * 115200 * 0x123
        configure(&mut uart, 1_843_200 * 0x123);
        assert_eq!(uart.reg(UART_DLL), 0x23);
        assert_eq!(uart.reg(UART_DLM), 0x01);
    }

    #[test]
    fn test_configure_without_clock_writes_zero_divisor() {
        let mut uart = Mock16550::new();

        assert_eq!(configure(&mut uart, 0), 0);
        let writes = uart.writes();
        assert_eq!(writes[3], (UART_DLL, 0));
        assert_eq!(writes[4], (UART_DLM, 0));
    }

    #[test]
    fn test_send_byte_waits_for_thre() {
        let mut uart = Mock16550::with_busy_polls(3);

        send_byte(&mut uart, b'a', TxWait::Spin).unwrap();
        assert_eq!(uart.transmitted(), b"a");
        assert_eq!(uart.lsr_reads(), 4);
    }

    #[test]
    fn test_bounded_wait_times_out() {
        let mut uart = Mock16550::stuck();

        let result = send_byte(&mut uart, b'a', TxWait::Bounded { max_polls: 50 });
        assert!(matches!(result, Err(DriverError::Timeout { polls: 50 })));
        assert_eq!(uart.lsr_reads(), 50);
        assert!(uart.transmitted().is_empty());
    }

    #[test]
    fn test_bounded_wait_succeeds_within_budget() {
        let mut uart = Mock16550::with_busy_polls(9);

        send_byte(&mut uart, b'z', TxWait::Bounded { max_polls: 10 }).unwrap();
        assert_eq!(uart.transmitted(), b"z");
    }
}
