use anyhow::Result;
use relief::{Encoding, NO_DATA};
use serde::Serialize;

#[derive(Serialize)]
struct HeightResponse {
    encoding: String,
    rgba: [u8; 4],
    elevation: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    no_data: bool,
}

pub fn run(encoding: &str, [r, g, b, a]: [u8; 4], json: bool) -> Result<()> {
    let encoding: Encoding = encoding.parse()?;
    let elevation = encoding.height(r, g, b, a);
    let no_data = encoding == Encoding::Gsi && elevation == NO_DATA;

    if json {
        let response = HeightResponse {
            encoding: encoding.to_string(),
            rgba: [r, g, b, a],
            elevation,
            no_data,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else if no_data {
        println!("no data");
    } else {
        println!("{:.2}", elevation);
    }

    Ok(())
}
