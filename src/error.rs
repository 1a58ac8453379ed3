use std::path::PathBuf;

/// Errors surfaced by the CLI frontend and the emulation core.
///
/// `Usage` and `Load` are raised before the emulation thread ever starts and
/// are handled by aborting startup with a non-zero exit code. `UnknownOpcode`
/// and `BusOutOfRange` are raised from inside the running emulation and are
/// fatal to it. `AudioDevice` is non-fatal: the caller is expected to log it
/// and keep running with the ring buffer filling silence.
#[derive(thiserror::Error, Debug)]
pub enum EmuError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("failed to load {path}: {source}", path = path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoadErrorKind,
    },

    #[error("unresolved opcode 0x{opcode:02x} at pc=0x{pc:04x}")]
    UnknownOpcode { pc: u16, opcode: u8 },

    #[error("bus access out of range: 0x{address:04x}")]
    BusOutOfRange { address: u16 },

    #[error("audio device error: {0}")]
    AudioDevice(String),
}

#[derive(thiserror::Error, Debug)]
pub enum LoadErrorKind {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("boot ROM must be exactly 256 or 2048 bytes, got {0}")]
    InvalidBootRomSize(usize),

    #[error("cartridge image is too small to contain a header")]
    TruncatedCartridge,
}
