use clap::{arg,crate_version,ArgAction,ArgMatches,Command};
use huffpack::huff;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const RCH: &str = "unreachable was reached";

fn ok_to_overwrite(path_out: &str) -> bool {
    if let Ok(_f) = std::fs::File::open(path_out) {
        let mut ans = String::new();
        eprint!("{} exists, overwrite? (y/n) ",path_out);
        if std::io::stdin().read_line(&mut ans).is_err() {
            return false;
        }
        if ans.trim_end()=="y" || ans.trim_end()=="Y" {
            log::warn!("existing file will not be truncated until the transform succeeds");
            return true;
        }
        return false;
    }
    true
}

/// Open the files named in `cmd` and gather options, `None` if the user declined to overwrite.
fn setup(cmd: &ArgMatches) -> Result<Option<(std::fs::File,std::fs::File,huff::Options)>,Box<dyn std::error::Error>> {
    let path_in = cmd.get_one::<String>("input").expect(RCH);
    let path_out = cmd.get_one::<String>("output").expect(RCH);
    if !ok_to_overwrite(path_out) {
        return Ok(None);
    }
    let in_file = std::fs::File::open(path_in)?;
    let out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
    let mut opt = huff::STD_OPTIONS;
    opt.verbosity = match cmd.get_count("verbose") {
        0 => 0,
        1 => huff::DEBUG_LOW,
        _ => huff::DEBUG_HIGH
    };
    Ok(Some((in_file,out_file,opt)))
}

fn main() -> STDRESULT
{
    let long_help =
"Examples:
---------
Compress:      `huffpack compress -i my_expanded -o my_compressed`
Expand:        `huffpack expand -i my_compressed -o my_expanded`
Show codes:    `huffpack compress -vv -i my_expanded -o my_compressed`";

    let mut main_cmd = Command::new("huffpack")
        .about("Compress and expand with static Huffman trees")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(-v --verbose "log a summary, repeat to log the code table").action(ArgAction::Count))
        .about("compress a file"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(-v --verbose "log a summary").action(ArgAction::Count))
        .about("expand a file"));

    let matches = main_cmd.get_matches();

    let verbose = match matches.subcommand() {
        Some((_,cmd)) => cmd.get_count("verbose") > 0,
        None => false
    };
    let default_filter = match verbose {
        true => "debug",
        false => "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let (mut in_file,mut out_file,opt) = match setup(cmd)? {
            Some(x) => x,
            None => {
                eprintln!("abort operation");
                return Ok(());
            }
        };
        let (in_size,out_size) = huff::compress(&mut in_file,&mut out_file,&opt)?;
        out_file.set_len(out_size)?;
        eprintln!("compressed {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let (mut in_file,mut out_file,opt) = match setup(cmd)? {
            Some(x) => x,
            None => {
                eprintln!("abort operation");
                return Ok(());
            }
        };
        let (in_size,out_size) = huff::expand(&mut in_file,&mut out_file,&opt)?;
        out_file.set_len(out_size)?;
        eprintln!("expanded {} into {}",in_size,out_size);
    }

    Ok(())
}
