use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use odkeyscript::script::{compile, disassemble, Compiler};
use odkeyscript::transport::hid::HidTransport;
use odkeyscript::transport::http::HttpTransport;
use odkeyscript::transport::protocol::USB_PID;
use odkeyscript::transport::protocol::USB_VID;
use odkeyscript::{DeviceTransport, NvsValue, Target};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "odkey", about = "Compile, disassemble and deploy ODKeyScript programs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Which transport to use for device operations.
    #[arg(long, global = true, value_enum, default_value = "usb")]
    interface: Interface,

    /// USB vendor ID, used when `--interface usb`.
    #[arg(long, global = true, default_value_t = USB_VID)]
    vid: u16,

    /// USB product ID, used when `--interface usb`.
    #[arg(long, global = true, default_value_t = USB_PID)]
    pid: u16,

    /// Open a specific HID device node directly instead of enumerating by
    /// vendor/product ID.
    #[arg(long, global = true)]
    device_path: Option<String>,

    /// Device hostname, used when `--interface http`.
    #[arg(long, global = true, default_value = "odkey.local")]
    host: String,

    /// Device port, used when `--interface http`.
    #[arg(long, global = true, default_value_t = 80)]
    port: u16,

    /// Bearer token for the HTTP API.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Increase log verbosity; repeatable.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum Interface {
    Usb,
    Http,
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetArg {
    Ram,
    Flash,
}

impl From<TargetArg> for Target {
    fn from(value: TargetArg) -> Self {
        match value {
            TargetArg::Ram => Target::Ram,
            TargetArg::Flash => Target::Flash,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Compile an ODKeyScript source file to bytecode.
    Compile {
        #[arg(value_name = "IN")]
        input: String,
        #[arg(value_name = "OUT")]
        output: String,
        /// Reject characters with no key mapping instead of falling back to
        /// SPACE.
        #[arg(long)]
        strict_typing: bool,
    },
    /// Print a human-readable listing of a bytecode file.
    Disassemble {
        #[arg(value_name = "IN")]
        input: String,
    },
    /// Upload a compiled program (or a .odk source, compiled on the fly).
    Upload {
        #[arg(value_name = "IN")]
        input: String,
        #[arg(long, value_enum, default_value = "flash")]
        target: TargetArg,
        /// Start executing the program immediately after upload completes.
        #[arg(long)]
        execute: bool,
    },
    /// Download the program currently stored on the device.
    Download {
        #[arg(long, value_enum, default_value = "flash")]
        target: TargetArg,
        #[arg(long)]
        output: Option<String>,
        /// Print a disassembly listing instead of raw bytes.
        #[arg(long)]
        disassemble: bool,
    },
    /// Start executing the program already stored on the device.
    Execute {
        #[arg(long, value_enum, default_value = "flash")]
        target: TargetArg,
    },
    /// Set a non-volatile key/value store entry.
    NvsSet {
        key: String,
        value: Option<String>,
        #[arg(long, default_value = "string")]
        r#type: String,
        /// Read the value from a file instead of the command line (used
        /// for `--type blob`).
        #[arg(long)]
        file: Option<String>,
    },
    /// Read a non-volatile key/value store entry.
    NvsGet {
        key: String,
        #[arg(long)]
        output: Option<String>,
    },
    /// Delete a non-volatile key/value store entry.
    NvsDelete { key: String },
    /// Stream the device's log buffer.
    Log {
        #[arg(long)]
        output: Option<String>,
    },
    /// Clear the device's log buffer.
    LogClear,
    /// List HID devices matching the configured vendor/product ID.
    ListDevices,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "odkey_cli=info,odkeyscript=info",
        1 => "odkey_cli=debug,odkeyscript=debug",
        _ => "odkey_cli=trace,odkeyscript=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match &cli.command {
        Command::Compile {
            input,
            output,
            strict_typing,
        } => run_compile(input, output, *strict_typing),
        Command::Disassemble { input } => run_disassemble(input),
        Command::Upload {
            input,
            target,
            execute,
        } => {
            let mut transport = open_transport(&cli)?;
            run_upload(transport.as_mut(), input, (*target).into(), *execute)
        }
        Command::Download {
            target,
            output,
            disassemble: want_disassembly,
        } => {
            let mut transport = open_transport(&cli)?;
            run_download(
                transport.as_mut(),
                (*target).into(),
                output.as_deref(),
                *want_disassembly,
            )
        }
        Command::Execute { target } => {
            let mut transport = open_transport(&cli)?;
            transport
                .execute_program((*target).into())
                .map_err(|e| e.to_string())
        }
        Command::NvsSet {
            key,
            value,
            r#type,
            file,
        } => {
            let mut transport = open_transport(&cli)?;
            run_nvs_set(transport.as_mut(), key, value.as_deref(), r#type, file.as_deref())
        }
        Command::NvsGet { key, output } => {
            let mut transport = open_transport(&cli)?;
            run_nvs_get(transport.as_mut(), key, output.as_deref())
        }
        Command::NvsDelete { key } => {
            let mut transport = open_transport(&cli)?;
            transport.nvs_delete(key).map_err(|e| e.to_string())
        }
        Command::Log { output } => {
            let mut transport = open_transport(&cli)?;
            run_log(transport.as_mut(), output.as_deref())
        }
        Command::LogClear => {
            let mut transport = open_transport(&cli)?;
            transport.clear_logs().map_err(|e| e.to_string())
        }
        Command::ListDevices => run_list_devices(&cli),
    }
}

/// The two transports satisfy the same trait but are distinct concrete
/// types; this enum dispatches to whichever one the user selected without
/// requiring `DeviceTransport` to be object-safe.
enum AnyTransport {
    Hid(HidTransport),
    Http(HttpTransport),
}

impl AnyTransport {
    fn as_mut(&mut self) -> &mut dyn DeviceTransportMut {
        match self {
            AnyTransport::Hid(t) => t,
            AnyTransport::Http(t) => t,
        }
    }
}

/// Object-safe subset of [`DeviceTransport`] used by the CLI dispatcher; the
/// trait itself takes `self` by value in `close`, which the CLI never calls
/// (the concrete transports release their connection on `Drop` instead).
trait DeviceTransportMut {
    fn upload_program(&mut self, target: Target, program: &[u8]) -> Result<(), odkeyscript::TransportError>;
    fn download_program(&mut self, target: Target) -> Result<Vec<u8>, odkeyscript::TransportError>;
    fn execute_program(&mut self, target: Target) -> Result<(), odkeyscript::TransportError>;
    fn nvs_set(&mut self, key: &str, value: &NvsValue) -> Result<(), odkeyscript::TransportError>;
    fn nvs_get(&mut self, key: &str) -> Result<NvsValue, odkeyscript::TransportError>;
    fn nvs_delete(&mut self, key: &str) -> Result<(), odkeyscript::TransportError>;
    fn download_logs(&mut self, sink: &mut dyn Write) -> Result<(), odkeyscript::TransportError>;
    fn clear_logs(&mut self) -> Result<(), odkeyscript::TransportError>;
}

impl<T: DeviceTransport> DeviceTransportMut for T {
    fn upload_program(&mut self, target: Target, program: &[u8]) -> Result<(), odkeyscript::TransportError> {
        DeviceTransport::upload_program(self, target, program)
    }
    fn download_program(&mut self, target: Target) -> Result<Vec<u8>, odkeyscript::TransportError> {
        DeviceTransport::download_program(self, target)
    }
    fn execute_program(&mut self, target: Target) -> Result<(), odkeyscript::TransportError> {
        DeviceTransport::execute_program(self, target)
    }
    fn nvs_set(&mut self, key: &str, value: &NvsValue) -> Result<(), odkeyscript::TransportError> {
        DeviceTransport::nvs_set(self, key, value)
    }
    fn nvs_get(&mut self, key: &str) -> Result<NvsValue, odkeyscript::TransportError> {
        DeviceTransport::nvs_get(self, key)
    }
    fn nvs_delete(&mut self, key: &str) -> Result<(), odkeyscript::TransportError> {
        DeviceTransport::nvs_delete(self, key)
    }
    fn download_logs(&mut self, sink: &mut dyn Write) -> Result<(), odkeyscript::TransportError> {
        DeviceTransport::download_logs(self, sink)
    }
    fn clear_logs(&mut self) -> Result<(), odkeyscript::TransportError> {
        DeviceTransport::clear_logs(self)
    }
}

fn open_transport(cli: &Cli) -> Result<AnyTransport, String> {
    match cli.interface {
        Interface::Usb => {
            let transport = match &cli.device_path {
                Some(path) => {
                    let cpath = std::ffi::CString::new(path.as_str())
                        .map_err(|e| format!("invalid device path: {e}"))?;
                    HidTransport::open_path(&cpath)
                }
                None => HidTransport::open(cli.vid, cli.pid),
            }
            .map_err(|e| e.to_string())?;
            Ok(AnyTransport::Hid(transport))
        }
        Interface::Http => {
            let transport = HttpTransport::new(&cli.host, cli.port, cli.api_key.as_deref())
                .map_err(|e| e.to_string())?;
            Ok(AnyTransport::Http(transport))
        }
    }
}

fn run_compile(input: &str, output: &str, strict_typing: bool) -> Result<(), String> {
    let source = fs::read_to_string(input).map_err(|e| format!("reading {input}: {e}"))?;
    let bytecode = Compiler::new(&source)
        .map_err(format_script_error)?
        .with_strict_typing(strict_typing)
        .compile()
        .map_err(format_script_error)?;
    fs::write(output, &bytecode).map_err(|e| format!("writing {output}: {e}"))?;
    Ok(())
}

fn run_disassemble(input: &str) -> Result<(), String> {
    let bytecode = fs::read(input).map_err(|e| format!("reading {input}: {e}"))?;
    for line in disassemble(&bytecode) {
        println!("{line}");
    }
    Ok(())
}

fn format_script_error(err: odkeyscript::ScriptError) -> String {
    format!(
        "error at line {}, column {}: {}",
        err.line(),
        err.column(),
        err.message()
    )
}

/// Loads program bytes from `path`: compiles `.odk` source on the fly,
/// loads any other file as raw bytecode.
fn load_program_data(path: &str) -> Result<Vec<u8>, String> {
    if path.ends_with(".odk") {
        let source = fs::read_to_string(path).map_err(|e| format!("reading {path}: {e}"))?;
        compile(&source).map_err(format_script_error)
    } else {
        fs::read(path).map_err(|e| format!("reading {path}: {e}"))
    }
}

fn run_upload(
    transport: &mut dyn DeviceTransportMut,
    input: &str,
    target: Target,
    execute: bool,
) -> Result<(), String> {
    let program = load_program_data(input)?;
    transport
        .upload_program(target, &program)
        .map_err(|e| e.to_string())?;
    if execute {
        transport.execute_program(target).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn run_download(
    transport: &mut dyn DeviceTransportMut,
    target: Target,
    output: Option<&str>,
    want_disassembly: bool,
) -> Result<(), String> {
    let program = transport.download_program(target).map_err(|e| e.to_string())?;

    if want_disassembly {
        for line in disassemble(&program) {
            println!("{line}");
        }
        return Ok(());
    }

    match output {
        Some(path) => fs::write(path, &program).map_err(|e| format!("writing {path}: {e}")),
        None => io::stdout()
            .write_all(&program)
            .map_err(|e| format!("writing to stdout: {e}")),
    }
}

fn parse_nvs_value(type_name: &str, value: Option<&str>, file: Option<&str>) -> Result<NvsValue, String> {
    if type_name == "blob" {
        let path = file.ok_or("--type blob requires --file")?;
        return fs::read(path)
            .map(NvsValue::Blob)
            .map_err(|e| format!("reading {path}: {e}"));
    }

    let text = value.ok_or_else(|| format!("a value is required for --type {type_name}"))?;
    match type_name {
        "u8" => text.parse().map(NvsValue::U8).map_err(|e| e.to_string()),
        "i8" => text.parse().map(NvsValue::I8).map_err(|e| e.to_string()),
        "u16" => text.parse().map(NvsValue::U16).map_err(|e| e.to_string()),
        "i16" => text.parse().map(NvsValue::I16).map_err(|e| e.to_string()),
        "u32" => text.parse().map(NvsValue::U32).map_err(|e| e.to_string()),
        "i32" => text.parse().map(NvsValue::I32).map_err(|e| e.to_string()),
        "u64" => text.parse().map(NvsValue::U64).map_err(|e| e.to_string()),
        "i64" => text.parse().map(NvsValue::I64).map_err(|e| e.to_string()),
        "string" => Ok(NvsValue::Str(text.to_string())),
        other => Err(format!("unrecognized --type '{other}'")),
    }
}

fn run_nvs_set(
    transport: &mut dyn DeviceTransportMut,
    key: &str,
    value: Option<&str>,
    type_name: &str,
    file: Option<&str>,
) -> Result<(), String> {
    let value = parse_nvs_value(type_name, value, file)?;
    transport.nvs_set(key, &value).map_err(|e| e.to_string())
}

fn run_nvs_get(transport: &mut dyn DeviceTransportMut, key: &str, output: Option<&str>) -> Result<(), String> {
    let value = transport.nvs_get(key).map_err(|e| e.to_string())?;
    let rendered = match &value {
        NvsValue::Blob(bytes) => {
            if let Some(path) = output {
                fs::write(path, bytes).map_err(|e| format!("writing {path}: {e}"))?;
                return Ok(());
            }
            format!("{} bytes of binary data", bytes.len())
        }
        other => format!("{other:?}"),
    };
    println!("{rendered}");
    Ok(())
}

fn run_log(transport: &mut dyn DeviceTransportMut, output: Option<&str>) -> Result<(), String> {
    match output {
        Some(path) => {
            let mut file = fs::File::create(path).map_err(|e| format!("creating {path}: {e}"))?;
            transport.download_logs(&mut file).map_err(|e| e.to_string())
        }
        None => transport
            .download_logs(&mut io::stdout())
            .map_err(|e| e.to_string()),
    }
}

fn run_list_devices(cli: &Cli) -> Result<(), String> {
    match cli.interface {
        Interface::Usb => {
            let api = hidapi::HidApi::new().map_err(|e| e.to_string())?;
            for device in api
                .device_list()
                .filter(|d| d.vendor_id() == cli.vid && d.product_id() == cli.pid)
            {
                println!(
                    "{} (interface {})",
                    device.path().to_string_lossy(),
                    device.interface_number()
                );
            }
        }
        Interface::Http => {
            let transport = HttpTransport::new(&cli.host, cli.port, cli.api_key.as_deref())
                .map_err(|e| e.to_string())?;
            if transport.find_device().map_err(|e| e.to_string())? {
                println!("{}:{}", cli.host, cli.port);
            }
        }
    }
    Ok(())
}
