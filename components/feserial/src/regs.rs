//! 16550 register map, OMAP flavour
//!
//! Indices are register numbers; the window scales them by 4.

use bitflags::bitflags;
use dddk_runtime::mmio::REG_STRIDE;
use static_assertions::const_assert;

/// Transmit holding register (write, DLAB clear)
pub const UART_TX: usize = 0;
/// Divisor latch low (DLAB set)
pub const UART_DLL: usize = 0;
/// Divisor latch high (DLAB set)
pub const UART_DLM: usize = 1;
/// FIFO control register (write)
pub const UART_FCR: usize = 2;
/// Line control register
pub const UART_LCR: usize = 3;
/// Line status register
pub const UART_LSR: usize = 5;
/// OMAP mode definition register 1
pub const UART_OMAP_MDR1: usize = 8;

/// Bytes a memory resource must span to cover every register above
pub const REG_BLOCK_SIZE: u64 = ((UART_OMAP_MDR1 + 1) * REG_STRIDE) as u64;

/// MDR1: UART disabled, divisor latches writable
pub const MDR1_DISABLE: u32 = 0x07;
/// MDR1: UART 16x mode
pub const MDR1_16X: u32 = 0x00;

bitflags! {
    /// Line control register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lcr: u32 {
        /// 8 data bits (no parity and 1 stop bit are the zero encodings)
        const WLEN8 = 0x03;
        const STOP = 0x04;
        const PARITY = 0x08;
        /// Divisor latch access
        const DLAB = 0x80;
    }

    /// Line status register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lsr: u32 {
        const DR = 0x01;
        /// Transmit holding register empty
        const THRE = 0x20;
        const TEMT = 0x40;
    }

    /// FIFO control register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Fcr: u32 {
        const ENABLE_FIFO = 0x01;
        const CLEAR_RCVR = 0x02;
        const CLEAR_XMIT = 0x04;
    }
}

// 8N1 must not carry DLAB, or the last LCR write would leave the latch open
const_assert!(Lcr::WLEN8.bits() & Lcr::DLAB.bits() == 0);
const_assert!(UART_TX == UART_DLL);
