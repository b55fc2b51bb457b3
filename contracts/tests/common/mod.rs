//! Shared fixtures for the engine integration suites.

#![allow(dead_code)]

use reit_contracts::{
    ConfigHandle, Engine, EngineSettings, IssuerInfo, RegisterInvestorParams,
    RegisterSchemeParams, Scheme, SchemeKind,
};
use reit_protocol::crypto::{Address, Keypair, Signer};

/// An initialized engine with a payment token investors can be funded in.
pub struct Market {
    pub engine: Engine,
    pub admin: Keypair,
    pub config: ConfigHandle,
    pub payment_issuer: Keypair,
    pub payment_mint: Address,
}

/// A registered scheme with its unit mint created.
pub struct Listed {
    pub promoter: Keypair,
    pub address: Address,
    pub mint: Address,
    pub scheme: Scheme,
}

/// A registered investor with a funded payment account.
pub struct Holder {
    pub keypair: Keypair,
    pub wallet: Address,
}

impl Holder {
    pub fn signer(&self) -> Signer {
        Signer::from_keypair(&self.keypair)
    }
}

pub fn market() -> Market {
    market_with(EngineSettings::default())
}

pub fn market_with(settings: EngineSettings) -> Market {
    let engine = Engine::in_memory(settings);
    let admin = Keypair::generate();
    let config = engine
        .initialize(&Signer::from_keypair(&admin))
        .expect("initialize");
    let payment_issuer = Keypair::generate();
    let payment_mint = Keypair::generate().address();
    engine
        .create_payment_mint(&Signer::from_keypair(&payment_issuer), &payment_mint, 9)
        .expect("payment mint");
    Market {
        engine,
        admin,
        config,
        payment_issuer,
        payment_mint,
    }
}

pub fn issuer_info(kind: SchemeKind) -> IssuerInfo {
    IssuerInfo {
        issuer_name: "Acorn Holdings".into(),
        scheme_name: "Acorn Student Housing".into(),
        kind,
        listing_date: "February 2021".into(),
    }
}

pub fn scheme_params(market: &Market, unit_cost: u64, decimals: u8) -> RegisterSchemeParams {
    RegisterSchemeParams {
        issuer: issuer_info(SchemeKind::Development),
        country: "KE".into(),
        unit_cost,
        decimals,
        payment_mint: market.payment_mint,
        deposit_ledger: Keypair::generate().address(),
    }
}

/// Register a scheme for a fresh promoter and create its unit mint.
pub fn list_scheme(market: &Market, unit_cost: u64, decimals: u8) -> Listed {
    let promoter = Keypair::generate();
    let signer = Signer::from_keypair(&promoter);
    let registered = market
        .engine
        .register_scheme(&market.config, &signer, scheme_params(market, unit_cost, decimals))
        .expect("register scheme");
    let mint = market
        .engine
        .create_mint(&signer, &registered.address, None)
        .expect("create mint");
    let scheme = market
        .engine
        .scheme(&registered.address)
        .unwrap()
        .expect("scheme stored");
    Listed {
        promoter,
        address: registered.address,
        mint,
        scheme,
    }
}

/// Register a fresh investor and fund their payment account.
pub fn investor_with_funds(market: &Market, funds: u64) -> Holder {
    let keypair = Keypair::generate();
    market
        .engine
        .register_investor(
            &Signer::from_keypair(&keypair),
            RegisterInvestorParams {
                full_names: "Wanjiku Achieng".into(),
                country: "KEN".into(),
            },
        )
        .expect("register investor");
    let wallet = if funds > 0 {
        market
            .engine
            .issue_payment(
                &Signer::from_keypair(&market.payment_issuer),
                &market.payment_mint,
                &keypair.address(),
                funds,
            )
            .expect("fund investor")
    } else {
        market
            .engine
            .open_token_account(&keypair.address(), &market.payment_mint)
            .expect("open wallet")
    };
    Holder { keypair, wallet }
}

pub fn units_held(market: &Market, holder: &Holder) -> u64 {
    market
        .engine
        .investor_of(&holder.keypair.address())
        .unwrap()
        .expect("investor")
        .units_held
}

pub fn outstanding(market: &Market, listed: &Listed) -> u64 {
    market
        .engine
        .scheme(&listed.address)
        .unwrap()
        .expect("scheme")
        .units_outstanding
}

pub fn net_deposited(market: &Market, listed: &Listed) -> i128 {
    market
        .engine
        .deposit_ledger(&listed.scheme.deposit_ledger)
        .unwrap()
        .expect("deposit ledger")
        .net_deposited
}

/// `holder`'s units in one scheme.
pub fn position_units(market: &Market, listed: &Listed, holder: &Holder) -> u64 {
    market
        .engine
        .position(&listed.address, &holder.keypair.address())
        .unwrap()
        .map_or(0, |position| position.units_held)
}

/// Sum of every position on the scheme's investor roster.
pub fn roster_units(market: &Market, listed: &Listed) -> u64 {
    market
        .engine
        .scheme_positions(&listed.address)
        .unwrap()
        .iter()
        .map(|position| position.units_held)
        .sum()
}
