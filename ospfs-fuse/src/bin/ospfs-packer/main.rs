mod cli;

use std::fs::OpenOptions;
use std::io;
use std::sync::{Arc, Mutex};

use clap::Parser;
use cli::Cli;
use ospfs::{BLOCK_SIZE, OspFileSystem};
use ospfs_fuse::{BlockFile, fs_error, listing, pack_dir};

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    println!("source={:?}\nout={:?}", cli.source, cli.out);

    let block_file = Arc::new(BlockFile(Mutex::new({
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&cli.out)?;
        fd.set_len(cli.blocks as u64 * BLOCK_SIZE as u64)?;

        fd
    })));

    let volume = OspFileSystem::format(block_file, cli.blocks, cli.inodes).map_err(fs_error)?;
    let root = OspFileSystem::root_inode(&volume);

    for name in pack_dir(&cli.source, &root, cli.mode)? {
        println!("file: {name:?}");
    }

    for (name, target) in &cli.links {
        let target = root.find(target).map_err(fs_error)?;
        root.link(&target, name).map_err(fs_error)?;
        log::info!("linked {name:?} to inode {}", target.ino());
    }

    for line in listing(&root)? {
        println!("{line}");
    }

    Ok(())
}
