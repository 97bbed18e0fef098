use fake::Fake;
use fake::faker::{address, company, internet, lorem, name, number, phone_number};
use fake::locales::{EN, PT_BR};
use rand::RngCore;

use crate::faker::locales::LocaleKey;

pub const ALL_IDS: &[&str] = &[
    "address.building_number",
    "address.city",
    "address.country",
    "address.state",
    "address.street",
    "address.zip",
    "company.buzzword",
    "company.industry",
    "company.name",
    "internet.domain_suffix",
    "internet.email",
    "internet.ipv4",
    "internet.safe_email",
    "internet.username",
    "lorem.paragraph",
    "lorem.sentence",
    "lorem.word",
    "lorem.words",
    "name.first_name",
    "name.last_name",
    "name.name",
    "name.title",
    "number.digit",
    "phone.cell",
    "phone.number",
];

macro_rules! localized {
    ($locale:expr, $rng:expr, $($faker:ident)::+ $(, $arg:expr)*) => {
        match $locale {
            LocaleKey::EnUs => {
                let value: String = $($faker)::+(EN $(, $arg)*).fake_with_rng($rng);
                value
            }
            LocaleKey::PtBr => {
                let value: String = $($faker)::+(PT_BR $(, $arg)*).fake_with_rng($rng);
                value
            }
        }
    };
}

pub fn generate_value(id: &str, locale: LocaleKey, rng: &mut dyn RngCore) -> Option<String> {
    let value = match id {
        "address.building_number" => localized!(locale, rng, address::raw::BuildingNumber),
        "address.city" => localized!(locale, rng, address::raw::CityName),
        "address.country" => localized!(locale, rng, address::raw::CountryName),
        "address.state" => localized!(locale, rng, address::raw::StateName),
        "address.street" => localized!(locale, rng, address::raw::StreetName),
        "address.zip" => localized!(locale, rng, address::raw::ZipCode),
        "company.buzzword" => localized!(locale, rng, company::raw::Buzzword),
        "company.industry" => localized!(locale, rng, company::raw::Industry),
        "company.name" => localized!(locale, rng, company::raw::CompanyName),
        "internet.domain_suffix" => localized!(locale, rng, internet::raw::DomainSuffix),
        "internet.email" => localized!(locale, rng, internet::raw::FreeEmail),
        "internet.ipv4" => localized!(locale, rng, internet::raw::IPv4),
        "internet.safe_email" => localized!(locale, rng, internet::raw::SafeEmail),
        "internet.username" => localized!(locale, rng, internet::raw::Username),
        "lorem.paragraph" => localized!(locale, rng, lorem::raw::Paragraph, 2..5),
        "lorem.sentence" => localized!(locale, rng, lorem::raw::Sentence, 4..10),
        "lorem.word" => localized!(locale, rng, lorem::raw::Word),
        "lorem.words" => {
            let words: Vec<String> = match locale {
                LocaleKey::EnUs => lorem::raw::Words(EN, 2..6).fake_with_rng(rng),
                LocaleKey::PtBr => lorem::raw::Words(PT_BR, 2..6).fake_with_rng(rng),
            };
            words.join(" ")
        }
        "name.first_name" => localized!(locale, rng, name::raw::FirstName),
        "name.last_name" => localized!(locale, rng, name::raw::LastName),
        "name.name" => localized!(locale, rng, name::raw::Name),
        "name.title" => localized!(locale, rng, name::raw::Title),
        "number.digit" => localized!(locale, rng, number::raw::Digit),
        "phone.cell" => localized!(locale, rng, phone_number::raw::CellNumber),
        "phone.number" => localized!(locale, rng, phone_number::raw::PhoneNumber),
        _ => return None,
    };
    Some(value)
}
