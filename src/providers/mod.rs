pub mod paysera;
