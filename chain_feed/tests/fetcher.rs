#[cfg(not(feature = "integration"))]
#[test]
fn integration_tests_disabled() {
    // Enable with: cargo test --features integration
}

#[cfg(feature = "integration")]
mod integration {
    use std::time::Duration;

    use alloy::providers::{Provider, ProviderBuilder};
    use testcontainers_modules::anvil::{AnvilNode, ANVIL_PORT};
    use testcontainers_modules::testcontainers::runners::AsyncRunner;
    use testcontainers_modules::testcontainers::ContainerAsync;
    use url::Url;

    use chain_feed::data::evm::WorldChainFetcher;
    use chain_feed::prelude::*;

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    async fn anvil_rpc_url(node: &ContainerAsync<AnvilNode>) -> Url {
        let port = node.get_host_port_ipv4(ANVIL_PORT).await.unwrap();
        format!("http://localhost:{port}").parse().unwrap()
    }

    #[tokio::test]
    async fn fetcher_reads_genesis_from_anvil() {
        let node = AnvilNode::default().start().await.unwrap();
        let fetcher = WorldChainFetcher::new(anvil_rpc_url(&node).await, REQUEST_TIMEOUT).unwrap();

        let data = fetcher.fetch().await.expect("genesis should be readable");

        assert_eq!(data.blocks.len(), 1, "only genesis exists");
        assert_eq!(data.blocks[0].height, 0);
        assert!(data.blocks[0].id.starts_with("0x"));
        assert!(data.transactions.is_empty());
        assert!(data.stats.gas_price.ends_with("Gwei"));
    }

    #[tokio::test]
    async fn fetcher_includes_transactions() {
        let node = AnvilNode::default().start().await.unwrap();
        let rpc_url = anvil_rpc_url(&node).await;
        let provider = ProviderBuilder::new().connect_http(rpc_url.clone());

        // Anvil pre-funds 10 accounts; send value transfers between them.
        let accounts = provider.get_accounts().await.unwrap();
        let (from, to) = (accounts[0], accounts[1]);
        for _ in 0..2 {
            let tx = alloy::rpc::types::TransactionRequest::default()
                .from(from)
                .to(to)
                .value(alloy::primitives::U256::from(1_000_000_000_000_000_000u128)); // 1 ETH
            provider
                .send_transaction(tx)
                .await
                .expect("send_transaction should succeed")
                .watch()
                .await
                .expect("transaction should be mined");
        }

        let fetcher = WorldChainFetcher::new(rpc_url, REQUEST_TIMEOUT).unwrap();
        let data = fetcher.fetch().await.unwrap();

        assert_eq!(data.blocks.len(), 3, "two mined blocks plus genesis");
        assert_eq!(data.blocks[0].height, 2);
        assert_eq!(data.transactions.len(), 2);
        let tx = &data.transactions[0];
        assert_eq!(tx.from, from.to_string());
        assert_eq!(tx.to, to.to_string());
        assert_eq!(tx.value, "1.0000 ETH");
    }
}
