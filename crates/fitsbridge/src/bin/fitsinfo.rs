use std::process;

use clap::Parser;
use fitsbridge::{
    check_name, DiskLibrary, FitsHandle, FitsLibrary, FitsStream, HduType, IoMode, Result, FITS,
};

/// Summarize the HDUs of a FITS file.
#[derive(Parser, Debug)]
#[command(name = "fitsinfo", version)]
struct Args {
    /// FITS file to inspect.
    path: String,
    /// Print every header record.
    #[arg(short, long)]
    verbose: bool,
    /// Only describe this HDU (1-based).
    #[arg(long)]
    hdu: Option<i32>,
}

fn describe_hdu(stream: &mut dyn FitsStream, verbose: bool) -> Result<String> {
    let mut out = String::new();
    let (extname, _) = FITS.settle(stream.read_card("EXTNAME"))?;
    let label = extname
        .and_then(|card| card.split('\'').nth(1).map(|s| format!(" (EXTNAME: {})", s.trim())))
        .unwrap_or_default();

    match FITS.settle(stream.hdu_type())?.0 {
        Some(HduType::Image) | None => {
            let kind = if stream.hdu_num() == 1 { "Primary" } else { "IMAGE extension" };
            let bitpix = FITS.settle(stream.image_type())?.0.unwrap_or(0);
            let naxes = FITS.settle(stream.image_size())?.0.unwrap_or_default();
            out.push_str(&format!("HDU {}: {kind}{label}\n", stream.hdu_num()));
            out.push_str(&format!("  BITPIX: {bitpix}\n"));
            out.push_str(&format!("  NAXIS: {}\n", naxes.len()));
            if !naxes.is_empty() {
                out.push_str(&format!("  Dimensions: {naxes:?}\n"));
            }
        }
        Some(kind) => {
            let name = if kind == HduType::AsciiTable { "TABLE" } else { "BINTABLE" };
            let ncols = FITS.settle(stream.num_cols())?.0.unwrap_or(0);
            let nrows = FITS.settle(stream.num_rows())?.0.unwrap_or(0);
            out.push_str(&format!("HDU {}: {name} extension{label}\n", stream.hdu_num()));
            out.push_str(&format!("  Columns: {ncols}\n"));
            out.push_str(&format!("  Rows: {nrows}\n"));
            for colnum in 1..=ncols {
                let info = FITS.settle(stream.column_type(colnum))?.0;
                if let Some(info) = info {
                    out.push_str(&format!(
                        "    {colnum}: type {} repeat {} width {}\n",
                        info.typecode, info.repeat, info.width
                    ));
                }
            }
        }
    }

    if verbose {
        let (nkeys, _) = FITS.settle(stream.header_space())?.0.unwrap_or((0, 0));
        out.push_str("  Header cards:\n");
        for nrec in 1..=nkeys {
            if let (Some(record), _) = FITS.settle(stream.read_record(nrec))? {
                out.push_str(&format!("    {record}\n"));
            }
        }
    }
    Ok(out)
}

fn run(args: &Args) -> Result<String> {
    let name = check_name(&args.path)?;
    let stream = FITS.settle(DiskLibrary.open(name, IoMode::ReadOnly))?.0;
    let Some(stream) = stream else {
        return Ok(String::new());
    };
    let mut handle = FitsHandle::new(stream);
    let stream = handle.access()?;
    let total = FITS.settle(stream.num_hdus())?.0.unwrap_or(0);
    let wanted: Vec<i32> = match args.hdu {
        Some(n) => vec![n],
        None => (1..=total).collect(),
    };

    let mut sections = Vec::new();
    for hdunum in wanted {
        FITS.settle(stream.move_abs_hdu(hdunum))?;
        sections.push(describe_hdu(stream, args.verbose)?);
    }
    handle.close();
    Ok(sections.join("\n"))
}

/// Release warnings show by default; `RUST_LOG` still overrides the level.
fn log_env() -> env_logger::Env<'static> {
    env_logger::Env::default().default_filter_or("warn")
}

fn main() {
    env_logger::Builder::from_env(log_env()).init();
    let args = Args::parse();
    match run(&args) {
        Ok(text) => print!("{text}"),
        Err(e) => {
            eprintln!("Error: {e}");
            while let Some(message) = DiskLibrary.next_message() {
                eprintln!("  {message}");
            }
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_logged_by_default() {
        if std::env::var_os("RUST_LOG").is_none() {
            let logger = env_logger::Builder::from_env(log_env()).build();
            assert_eq!(logger.filter(), log::LevelFilter::Warn);
        }
    }
}
