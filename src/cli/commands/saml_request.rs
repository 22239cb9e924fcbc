use anyhow::Result;

use crate::cli::args::SamlRequestCommands;
use crate::sso::saml_request::{decode, AuthnRequest};

pub fn run_saml_request_command(command: &SamlRequestCommands) -> Result<()> {
    match command {
        SamlRequestCommands::Encode {
            issuer,
            acs_url,
            destination,
            show_xml,
        } => {
            let request = AuthnRequest::new(issuer, acs_url, destination);
            if *show_xml {
                println!("{}", request.to_xml());
            }
            println!("{}", request.encode()?);
        }
        SamlRequestCommands::Decode { value } => println!("{}", decode(value)?),
    }
    Ok(())
}
