use serde::Serialize;
use sensorview_transport::{ipv4_interfaces, pick_best, viewer_url, DEFAULT_INDEX_PAGE};

use crate::cmd::NetinfoArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct InterfaceInfo {
    name: String,
    addr: String,
    rank: String,
    preferred: bool,
}

#[derive(Serialize)]
struct NetinfoOutput {
    interfaces: Vec<InterfaceInfo>,
    url: String,
}

pub fn run(args: NetinfoArgs, format: OutputFormat) -> CliResult<i32> {
    let addrs = ipv4_interfaces().map_err(|err| transport_error("interface lookup failed", err))?;
    let best = pick_best(&addrs);

    let url = viewer_url(
        best.map_or_else(|| "0.0.0.0".to_string(), |b| b.addr.to_string()),
        args.port,
        DEFAULT_INDEX_PAGE,
    );
    let interfaces = addrs
        .iter()
        .map(|a| InterfaceInfo {
            name: a.name.clone(),
            addr: a.addr.to_string(),
            rank: format!("{:?}", a.rank).to_ascii_lowercase(),
            preferred: best.is_some_and(|b| std::ptr::eq(b, a)),
        })
        .collect();

    let out = NetinfoOutput { interfaces, url };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => {
            let rows = out
                .interfaces
                .iter()
                .map(|i| {
                    vec![
                        i.name.clone(),
                        i.addr.clone(),
                        i.rank.clone(),
                        if i.preferred { "*".to_string() } else { String::new() },
                    ]
                })
                .collect();
            print_table(&["INTERFACE", "ADDRESS", "RANK", "PREFERRED"], rows);
            println!("Viewer: {}", out.url);
        }
    }
    Ok(SUCCESS)
}
