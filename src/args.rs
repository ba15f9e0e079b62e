use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
pub struct Args {
    /// Whether clients connect to the server over https.
    /// If so, the sessionid cookie is sent as a secure cookie.
    #[arg(short, long)]
    secure: bool,

    /// The address to listen on. By default the server
    /// will listen just on the IPv4 loopback.
    #[arg(short, long)]
    address: Option<String>,

    /// The port to listen on.
    #[arg(short, long, default_value_t = 80)]
    port: u16,

    /// Directory holding the database. It's created
    /// and migrated on startup if needed.
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// How many days a login lasts before the user
    /// has to log in again.
    #[arg(long, default_value_t = 14)]
    session_days: u32,
}

impl Args {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.address
            .as_deref()
            .unwrap_or("127.0.0.1")
            .parse()
            .map(|addr: IpAddr| (addr, self.port).into())
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn session_days(&self) -> u32 {
        self.session_days
    }
}
