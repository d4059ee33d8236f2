/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

use env_logger::Env;
use log::{error, info};
use psense::{Backend, FramerError, Session, SessionError};
use std::{process::ExitCode, str::FromStr};

#[derive(Debug)]
enum Error {
    InvalidArgument,
    Session(SessionError),
    Framer(FramerError),
    Parse(std::num::ParseIntError),
}

type Result<T> = std::result::Result<T, Error>;

fn parse_number(input: &str) -> Result<u32> {
    if let Some(stripped) = input.strip_prefix("0x") {
        u32::from_str_radix(stripped, 16).map_err(Error::Parse)
    } else {
        input.parse::<u32>().map_err(Error::Parse)
    }
}

fn psense() -> Result<()> {
    let matches = clap::command!()
        .arg(
            clap::arg!(-s --speed [SPEED] "i2c bus speed in Hz.")
                .default_value("100000"),
        )
        .arg(
            clap::arg!(-a --address [ADDRESS] "i2c slave address of the sensor.")
                .default_value("0x18"),
        )
        .arg(
            clap::arg!(-r --register [REGISTER] "sensor register to read.")
                .default_value("0xfd"),
        )
        .arg(
            clap::arg!(-b --backend [BACKEND] "usb backend: endpoint transfers (`usb`) or hid reports (`hid`).")
                .default_value("usb"),
        )
        .get_matches();

    let speed = parse_number(matches.get_one::<String>("speed").unwrap())?;
    let address = parse_number(matches.get_one::<String>("address").unwrap())?;
    let register = parse_number(matches.get_one::<String>("register").unwrap())?;
    if address > 0x7f || register > 0xff {
        return Err(Error::InvalidArgument);
    }

    let backend = Backend::from_str(matches.get_one::<String>("backend").unwrap())
        .map_err(|_| Error::InvalidArgument)?;

    let mut session = Session::connect(backend).map_err(Error::Session)?;
    session.configure(speed).map_err(Error::Framer)?;

    let mut device = session.framer();
    device
        .write(address as u8, &[register as u8])
        .map_err(Error::Framer)?;
    let data = device.read(address as u8, 1).map_err(Error::Framer)?;

    match data.first() {
        Some(value) => info!("register {register:#04x} = {value:#04x}"),
        None => info!("register {register:#04x}: no data returned"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match psense() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("psense: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
