use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Directory whose regular files are packed into the root directory
    #[arg(long, short)]
    pub source: PathBuf,

    /// Output image file
    #[arg(long, short)]
    pub out: PathBuf,

    /// Image size in blocks
    #[arg(long, default_value_t = 4096)]
    pub blocks: u32,

    /// Capacity of the inode table
    #[arg(long, default_value_t = 256)]
    pub inodes: u32,

    /// Permission bits of packed files, in octal
    #[arg(long, default_value = "644", value_parser = parse_mode)]
    pub mode: u32,

    /// Extra hard link `NAME=TARGET` in the root directory, may be repeated
    #[arg(long = "link", value_parser = parse_link)]
    pub links: Vec<(String, String)>,
}

fn parse_mode(s: &str) -> Result<u32, String> {
    u32::from_str_radix(s, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .ok_or_else(|| format!("`{s}` is not an octal permission mode"))
}

fn parse_link(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(name, target)| !name.is_empty() && !target.is_empty())
        .map(|(name, target)| (name.to_owned(), target.to_owned()))
        .ok_or_else(|| format!("`{s}` doesn't match `NAME=TARGET`"))
}
